//! [`Forum`] — the request flows tying the store, the file store and the
//! notification transport together.
//!
//! Each operation re-reads the state it decides on, applies the pure rules of
//! [`crate::visibility`], [`crate::authz`] and [`crate::notify`], and performs
//! its writes through one transactional store call. Attachment file removal
//! and notification delivery happen outside that transaction and never fail
//! the request.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
  authz::{self, Actor},
  dashboard,
  directory::{LessonSummary, Profile, Section, Skill, User},
  error::{Error, Missing, Result, ValidationError, ValidationErrors},
  files::{FileHandle, FileStore},
  ids::{AttachmentId, MessageId, ProfessorId, SectionId, SkillId, ThreadId, UserId},
  notify::{self, Dispatch, NotificationTransport},
  store::ForumStore,
  thread::{
    Attachment, AttachmentUpload, DeleteOutcome, Message, MessageEdit,
    MessageWithAttachments, NewAttachment, NewReply, NewThread, Thread,
    ThreadView,
  },
  tree::{ReplyNode, ReplyTree},
  visibility::{self, ThreadDraft, ThreadTargets, Visibility, classify},
};

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// A thread submission, as received from the compose form.
#[derive(Debug, Clone, Default)]
pub struct NewThreadForm {
  pub title:      String,
  pub targets:    ThreadTargets,
  pub section:    Option<SectionId>,
  pub skills:     Vec<SkillId>,
  /// Content of the first message.
  pub content:    String,
  pub attachment: Option<NewAttachment>,
}

#[derive(Debug, Clone, Default)]
pub struct ReplyForm {
  pub parent:     Option<MessageId>,
  pub content:    String,
  pub attachment: Option<NewAttachment>,
}

#[derive(Debug, Clone, Default)]
pub struct EditForm {
  pub content:    String,
  /// Replaces every existing attachment of the message when set.
  pub attachment: Option<NewAttachment>,
}

// ─── Outputs ─────────────────────────────────────────────────────────────────

/// A professor that can be addressed by a public thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfessorEntry {
  pub id:   ProfessorId,
  pub user: User,
}

/// Skills a user can tag a thread with, and the sections they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkillCatalog {
  pub skills:   Vec<Skill>,
  pub sections: Vec<Section>,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct Forum<S, F, T> {
  store:     S,
  files:     F,
  transport: T,
}

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> Error {
  Error::Store(Box::new(e))
}

fn files_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> Error {
  Error::Files(Box::new(e))
}

impl<S, F, T> Forum<S, F, T>
where
  S: ForumStore,
  F: FileStore,
  T: NotificationTransport,
{
  pub fn new(store: S, files: F, transport: T) -> Self {
    Self { store, files, transport }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn files(&self) -> &F { &self.files }

  pub fn transport(&self) -> &T { &self.transport }

  pub async fn actor(&self, user: UserId) -> Result<Actor> {
    Actor::load(&self.store, user).await.map_err(store_err)
  }

  async fn user(&self, id: UserId) -> Result<User> {
    self
      .store
      .get_user(id)
      .await
      .map_err(store_err)?
      .ok_or(Error::NotFound(Missing::User(id)))
  }

  async fn thread(&self, id: ThreadId) -> Result<Thread> {
    self
      .store
      .get_thread(id)
      .await
      .map_err(store_err)?
      .ok_or(Error::NotFound(Missing::Thread(id)))
  }

  async fn message(&self, id: MessageId) -> Result<Message> {
    self
      .store
      .get_message(id)
      .await
      .map_err(store_err)?
      .ok_or(Error::NotFound(Missing::Message(id)))
  }

  async fn tree(&self, thread: ThreadId) -> Result<ReplyTree> {
    let messages = self.store.thread_messages(thread).await.map_err(store_err)?;
    Ok(ReplyTree::new(messages))
  }

  // ── Dashboard ─────────────────────────────────────────────────────────

  /// Every thread visible to `user`, deduplicated.
  pub async fn dashboard(&self, user: UserId) -> Result<Vec<Thread>> {
    dashboard::all_visible_threads(&self.store, user)
      .await
      .map_err(store_err)
  }

  // ── Thread creation ───────────────────────────────────────────────────

  /// Validate a submission, collecting every field error, resolve its
  /// target and skills, then insert the thread with its skills and first
  /// message atomically.
  pub async fn create_thread(
    &self,
    author: UserId,
    form: NewThreadForm,
  ) -> Result<(Thread, Message)> {
    let author_user = self.user(author).await?;
    let mut errors = ValidationErrors::new();

    let draft = ThreadDraft { title: form.title.clone(), targets: form.targets };
    let visibility = match visibility::validate(&draft) {
      Ok(v) => Some(v),
      Err(found) => {
        errors.extend(found);
        Visibility::from_targets(draft.targets).ok()
      }
    };

    if form.targets.is_empty() {
      errors.push(ValidationError::MissingTarget);
    }
    if form.content.trim().is_empty() {
      errors.push(ValidationError::EmptyContent);
    }

    let visibility = match (errors.into_result(()), visibility) {
      (Ok(()), Some(v)) => v,
      (Err(errors), _) => return Err(Error::Validation(errors)),
      (Ok(()), None) => {
        return Err(Error::Validation(ValidationError::ConflictingVisibility.into()));
      }
    };

    // References are only resolved once the form itself is well formed.
    self.check_target(&visibility).await?;
    if let Some(section) = form.section
      && self.store.get_section(section).await.map_err(store_err)?.is_none()
    {
      return Err(Error::NotFound(Missing::Section(section)));
    }

    let mut skill_ids = Vec::new();
    for id in &form.skills {
      if !skill_ids.contains(id) {
        skill_ids.push(*id);
      }
    }
    let known: HashSet<SkillId> = self
      .store
      .get_skills(&skill_ids)
      .await
      .map_err(store_err)?
      .into_iter()
      .map(|s| s.id)
      .collect();
    if let Some(&unknown) = skill_ids.iter().find(|id| !known.contains(id)) {
      return Err(Error::NotFound(Missing::Skill(unknown)));
    }

    let upload = self.upload(form.attachment).await?;
    let handle = upload.as_ref().map(|u| u.file.handle.clone());

    let created = self
      .store
      .create_thread(NewThread {
        title: form.title.trim().to_owned(),
        author_id: author,
        visibility,
        section_id: form.section,
        skills: skill_ids,
        content: form.content,
        attachment: upload,
      })
      .await;

    let (thread, message) = match created {
      Ok(pair) => pair,
      Err(e) => {
        self.discard_files(handle.into_iter().collect()).await;
        return Err(store_err(e));
      }
    };

    info!(
      thread = %thread.id,
      author = %author,
      visibility = %classify(&thread),
      "thread created"
    );

    self.announce_thread(&thread, &author_user).await;
    Ok((thread, message))
  }

  async fn check_target(&self, visibility: &Visibility) -> Result<()> {
    let missing = match *visibility {
      Visibility::Private { recipient: None } => None,
      Visibility::Private { recipient: Some(id) } => self
        .store
        .get_user(id)
        .await
        .map_err(store_err)?
        .is_none()
        .then_some(Missing::User(id)),
      Visibility::PublicClass { lesson } => self
        .store
        .get_lesson(lesson)
        .await
        .map_err(store_err)?
        .is_none()
        .then_some(Missing::Lesson(lesson)),
      Visibility::PublicProfessor { professor } => self
        .store
        .get_professor(professor)
        .await
        .map_err(store_err)?
        .is_none()
        .then_some(Missing::Professor(professor)),
    };
    match missing {
      Some(missing) => Err(Error::NotFound(missing)),
      None => Ok(()),
    }
  }

  // ── Reading ───────────────────────────────────────────────────────────

  /// Open a thread: its messages in chronological order, the previous visit
  /// time (then recorded as now), and which messages the viewer may modify.
  pub async fn open_thread(&self, user: UserId, id: ThreadId) -> Result<ThreadView> {
    let thread = self.thread(id).await?;
    let actor = self.actor(user).await?;
    authz::check_read(&thread, &actor)?;

    let tree = self.tree(id).await?;
    let skills = self.store.thread_skills(id).await.map_err(store_err)?;

    let mut attachments: HashMap<MessageId, Vec<Attachment>> = HashMap::new();
    for attachment in self.store.thread_attachments(id).await.map_err(store_err)? {
      attachments.entry(attachment.message_id).or_default().push(attachment);
    }

    let editable: Vec<MessageId> = tree
      .messages()
      .iter()
      .filter(|m| authz::can_modify(&thread, &tree, m, &actor))
      .map(|m| m.id)
      .collect();

    let last_visit = self
      .store
      .touch_last_visit(user, id, Utc::now())
      .await
      .map_err(store_err)?
      .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let messages = tree
      .into_messages()
      .into_iter()
      .map(|message| MessageWithAttachments {
        attachments: attachments.remove(&message.id).unwrap_or_default(),
        message,
      })
      .collect();

    Ok(ThreadView { thread, skills, messages, last_visit, editable })
  }

  /// The reply forest of a thread, one tree per root message.
  pub async fn thread_tree(&self, user: UserId, id: ThreadId) -> Result<Vec<ReplyNode>> {
    let thread = self.thread(id).await?;
    let actor = self.actor(user).await?;
    authz::check_read(&thread, &actor)?;
    Ok(self.tree(id).await?.forest())
  }

  /// An attachment's metadata and bytes.
  pub async fn attachment(
    &self,
    user: UserId,
    id: AttachmentId,
  ) -> Result<(Attachment, Bytes)> {
    let attachment = self
      .store
      .get_attachment(id)
      .await
      .map_err(store_err)?
      .ok_or(Error::NotFound(Missing::Attachment(id)))?;
    let message = self.message(attachment.message_id).await?;
    let thread = self.thread(message.thread_id).await?;
    let actor = self.actor(user).await?;
    authz::check_read(&thread, &actor)?;

    let data = self.files.read(&attachment.handle).await.map_err(files_err)?;
    Ok((attachment, data))
  }

  // ── Replies ───────────────────────────────────────────────────────────

  pub async fn reply(
    &self,
    user: UserId,
    thread_id: ThreadId,
    form: ReplyForm,
  ) -> Result<Message> {
    let thread = self.thread(thread_id).await?;
    let actor = self.actor(user).await?;
    authz::check_read(&thread, &actor)?;

    if form.content.trim().is_empty() {
      return Err(Error::BadRequest("Malformed request: missing content".into()));
    }

    if let Some(parent_id) = form.parent {
      let parent = self.message(parent_id).await?;
      if parent.thread_id != thread_id {
        return Err(Error::BadRequest(format!(
          "message {parent_id} does not belong to thread {thread_id}"
        )));
      }
    }

    let upload = self.upload(form.attachment).await?;
    let handle = upload.as_ref().map(|u| u.file.handle.clone());

    let posted = self
      .store
      .post_reply(NewReply {
        thread_id,
        author_id: user,
        parent_id: form.parent,
        content: form.content,
        attachment: upload,
      })
      .await;

    let message = match posted {
      Ok(message) => message,
      Err(e) => {
        self.discard_files(handle.into_iter().collect()).await;
        return Err(store_err(e));
      }
    };

    debug!(thread = %thread_id, message = %message.id, "reply posted");

    self.announce_reply(&thread, &message).await;
    Ok(message)
  }

  // ── Edit / delete ─────────────────────────────────────────────────────

  /// Load the thread, the message and the actor, then require permission to
  /// modify. Permission is checked before anything about the payload.
  async fn authorize_modification(
    &self,
    user: UserId,
    thread_id: ThreadId,
    message_id: MessageId,
  ) -> Result<Message> {
    let thread = self.thread(thread_id).await?;
    let message = self.message(message_id).await?;
    let actor = self.actor(user).await?;
    let tree = self.tree(thread_id).await?;

    if let Err(denied) = authz::check_modify(&thread, &tree, &message, &actor) {
      debug!(
        user = %user,
        thread = %thread_id,
        message = %message_id,
        reason = %denied,
        "modification denied"
      );
      return Err(Error::Forbidden(denied));
    }
    Ok(message)
  }

  pub async fn edit_message(
    &self,
    user: UserId,
    thread_id: ThreadId,
    message_id: MessageId,
    form: EditForm,
  ) -> Result<Message> {
    self.authorize_modification(user, thread_id, message_id).await?;

    if form.content.trim().is_empty() {
      return Err(Error::BadRequest("Missing content".into()));
    }

    let upload = self.upload(form.attachment).await?;
    let handle = upload.as_ref().map(|u| u.file.handle.clone());

    let edited = self
      .store
      .edit_message(MessageEdit { message_id, content: form.content, attachment: upload })
      .await;

    let outcome = match edited {
      Ok(outcome) => outcome,
      Err(e) => {
        self.discard_files(handle.into_iter().collect()).await;
        return Err(store_err(e));
      }
    };

    self
      .discard_files(outcome.replaced.into_iter().map(|a| a.handle).collect())
      .await;
    Ok(outcome.message)
  }

  /// Delete a childless message. When it was the last one the thread is
  /// deleted too and the caller should go back to the dashboard.
  pub async fn delete_message(
    &self,
    user: UserId,
    thread_id: ThreadId,
    message_id: MessageId,
  ) -> Result<DeleteOutcome> {
    self.authorize_modification(user, thread_id, message_id).await?;

    let attachments = self.store.attachments_of(message_id).await.map_err(store_err)?;
    self
      .discard_files(attachments.into_iter().map(|a| a.handle).collect())
      .await;

    let outcome = self.store.delete_message(message_id).await.map_err(store_err)?;
    if outcome.thread_deleted {
      info!(thread = %thread_id, "last message deleted; thread removed");
    }
    Ok(outcome)
  }

  // ── Compose helpers ───────────────────────────────────────────────────

  pub async fn list_users(&self) -> Result<Vec<User>> {
    self.store.list_users().await.map_err(store_err)
  }

  /// Professors teaching the user's lessons, the user's own professor
  /// profile excluded.
  pub async fn target_professors(&self, user: UserId) -> Result<Vec<ProfessorEntry>> {
    let actor = self.actor(user).await?;
    let own = actor.professor_id();

    let mut out = Vec::new();
    for professor in actor.professors.iter().filter(|p| Some(p.id) != own) {
      if let Some(user) = self.store.get_user(professor.user_id).await.map_err(store_err)? {
        out.push(ProfessorEntry { id: professor.id, user });
      }
    }
    Ok(out)
  }

  /// Lessons the user is enrolled in or teaches.
  pub async fn target_lessons(&self, user: UserId) -> Result<Vec<LessonSummary>> {
    let lessons = match self.store.profile_of(user).await.map_err(store_err)? {
      Some(Profile::Student(s)) => {
        self.store.lessons_of_student(s.id).await.map_err(store_err)?
      }
      Some(Profile::Professor(p)) => {
        self.store.lessons_of_professor(p.id).await.map_err(store_err)?
      }
      None => Vec::new(),
    };
    Ok(lessons.iter().map(|l| l.summary()).collect())
  }

  /// Skills of the stages of the user's lessons, sorted by name, and their
  /// distinct sections.
  pub async fn skills_for(&self, user: UserId) -> Result<SkillCatalog> {
    let actor = self.actor(user).await?;
    let found = self
      .store
      .skills_of_lessons(&actor.lessons)
      .await
      .map_err(store_err)?;

    let mut seen = HashSet::new();
    let mut skills: Vec<Skill> =
      found.into_iter().filter(|s| seen.insert(s.id)).collect();
    skills.sort_by(|a, b| a.name.cmp(&b.name));

    let mut sections: Vec<Section> = Vec::new();
    for section in skills.iter().filter_map(|s| s.section.as_ref()) {
      if !sections.iter().any(|known| known.id == section.id) {
        sections.push(section.clone());
      }
    }
    sections.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(SkillCatalog { skills, sections })
  }

  // ── Side effects ──────────────────────────────────────────────────────

  async fn upload(
    &self,
    attachment: Option<NewAttachment>,
  ) -> Result<Option<AttachmentUpload>> {
    let Some(NewAttachment { name, data }) = attachment else {
      return Ok(None);
    };
    let file = self.files.put(&name, data).await.map_err(files_err)?;
    Ok(Some(AttachmentUpload { name, file }))
  }

  /// Best-effort removal: a failure leaves an orphaned file behind and is
  /// only logged.
  async fn discard_files(&self, handles: Vec<FileHandle>) {
    for handle in handles {
      if let Err(e) = self.files.remove(&handle).await {
        warn!(handle = %handle, error = %e, "failed to remove attachment file");
      }
    }
  }

  // The write has committed by the time these run: lookup failures are
  // logged and the request still succeeds.

  async fn announce_thread(&self, thread: &Thread, author: &User) {
    let lessons = match notify::routing_lessons(&self.store, thread).await {
      Ok(lessons) => lessons,
      Err(e) => {
        warn!(thread = %thread.id, error = %e, "thread not notified");
        return;
      }
    };
    let dispatch = notify::audience_for_new_thread(thread, &author.summary(), &lessons);
    self.notify(dispatch).await;
  }

  async fn announce_reply(&self, thread: &Thread, message: &Message) {
    let resolved = async {
      let author = self.store.get_user(thread.author_id).await?;
      let replier = self.store.get_user(message.author_id).await?;
      let lessons = notify::routing_lessons(&self.store, thread).await?;
      Ok::<_, S::Error>((author, replier, lessons))
    };
    match resolved.await {
      Ok((Some(author), Some(replier), lessons)) => {
        let dispatch = notify::audience_for_new_message(
          thread,
          message,
          &author.summary(),
          &replier.summary(),
          &lessons,
        );
        self.notify(dispatch).await;
      }
      Ok(_) => warn!(thread = %thread.id, "participant missing; reply not notified"),
      Err(e) => warn!(thread = %thread.id, error = %e, "reply not notified"),
    }
  }

  /// Persist, then deliver. Neither step can fail the triggering request.
  async fn notify(&self, dispatch: Dispatch) {
    let kind = dispatch.kind;
    match self.store.save_notification(dispatch.into_notification()).await {
      Ok(notification) => {
        debug!(
          kind = %kind,
          audience = notification.audience.len(),
          "notification dispatched"
        );
        self.transport.deliver(&notification).await;
      }
      Err(e) => warn!(kind = %kind, error = %e, "failed to persist notification"),
    }
  }
}
