//! The notification router.
//!
//! [`audience_for_new_thread`] and [`audience_for_new_message`] are pure: given
//! a thread (and the reply, for messages) plus the summaries the caller
//! resolved, they decide who hears about it and what the payload says. The
//! [`NotificationTransport`] only ever sees the finished [`Notification`].

use std::{fmt, future::Future, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
  directory::{LessonSummary, UserSummary},
  ids::{LessonId, MessageId, NotificationId, ThreadId, UserId},
  store::ForumStore,
  thread::{Message, Thread},
  visibility::Visibility,
};

// ─── Vocabulary ──────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
pub enum NotificationKind {
  #[serde(rename = "new_public_forum_thread")]
  #[strum(serialize = "new_public_forum_thread")]
  NewPublicThread,
  #[serde(rename = "new_class_forum_thread")]
  #[strum(serialize = "new_class_forum_thread")]
  NewClassThread,
  #[serde(rename = "new_private_forum_thread")]
  #[strum(serialize = "new_private_forum_thread")]
  NewPrivateThread,
  #[serde(rename = "new_public_forum_message")]
  #[strum(serialize = "new_public_forum_message")]
  NewPublicMessage,
  #[serde(rename = "new_class_forum_message")]
  #[strum(serialize = "new_class_forum_message")]
  NewClassMessage,
  #[serde(rename = "new_private_forum_message")]
  #[strum(serialize = "new_private_forum_message")]
  NewPrivateMessage,
}

impl NotificationKind {
  /// The message counterpart of a thread kind; message kinds map to
  /// themselves.
  pub fn for_message(self) -> Self {
    match self {
      Self::NewPublicThread | Self::NewPublicMessage => Self::NewPublicMessage,
      Self::NewClassThread | Self::NewClassMessage => Self::NewClassMessage,
      Self::NewPrivateThread | Self::NewPrivateMessage => Self::NewPrivateMessage,
    }
  }
}

/// Delivery channel. Only the websocket channel exists.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
pub enum Medium {
  #[default]
  #[serde(rename = "web-socket")]
  #[strum(serialize = "web-socket")]
  WebSocket,
}

/// A routing target: one user, or every member of a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
  User(UserId),
  Class(LessonId),
}

impl fmt::Display for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::User(id) => write!(f, "user:{id}"),
      Self::Class(id) => write!(f, "class:{id}"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid routing target: {0:?}")]
pub struct InvalidTarget(pub String);

impl FromStr for Target {
  type Err = InvalidTarget;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || InvalidTarget(s.to_owned());
    let (scope, id) = s.split_once(':').ok_or_else(invalid)?;
    let id: i64 = id.parse().map_err(|_| invalid())?;
    match scope {
      "user" => Ok(Self::User(UserId(id))),
      "class" => Ok(Self::Class(LessonId(id))),
      _ => Err(invalid()),
    }
  }
}

impl Serialize for Target {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for Target {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
  }
}

// ─── Payload ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRef {
  pub id:    ThreadId,
  pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationParams {
  pub thread:     ThreadRef,
  /// The thread's author.
  pub author:     UserSummary,
  /// The lessons the notification is routed through, if any.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub lessons:    Vec<LessonSummary>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message_id: Option<MessageId>,
  /// Who posted the reply, for message notifications.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub replier:    Option<UserSummary>,
  /// Where a click on the notification should lead.
  pub redirect:   String,
}

/// The router's verdict for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
  pub kind:     NotificationKind,
  pub audience: Vec<Target>,
  pub params:   NotificationParams,
}

impl Dispatch {
  pub fn into_notification(self) -> NewNotification {
    NewNotification {
      audience: self.audience,
      medium:   Medium::WebSocket,
      kind:     self.kind,
      params:   self.params,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
  pub audience: Vec<Target>,
  pub medium:   Medium,
  pub kind:     NotificationKind,
  pub params:   NotificationParams,
}

/// A persisted notification record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub id:           NotificationId,
  pub audience:     Vec<Target>,
  pub medium:       Medium,
  #[serde(rename = "type")]
  pub kind:         NotificationKind,
  pub params:       NotificationParams,
  pub created_date: DateTime<Utc>,
}

// ─── Transport ───────────────────────────────────────────────────────────────

/// Delivers a persisted notification to its audience. Failures stay inside
/// the transport.
pub trait NotificationTransport: Send + Sync {
  fn deliver<'a>(
    &'a self,
    notification: &'a Notification,
  ) -> impl Future<Output = ()> + Send + 'a;
}

// ─── Routing ─────────────────────────────────────────────────────────────────

pub fn thread_path(thread: ThreadId) -> String { format!("/forum/thread/{thread}") }

/// Route a freshly created thread.
///
/// `lessons` are the lessons taught by the targeted professor for
/// PublicProfessor threads and the targeted lesson for PublicClass threads;
/// they are ignored for private threads.
pub fn audience_for_new_thread(
  thread: &Thread,
  author: &UserSummary,
  lessons: &[LessonSummary],
) -> Dispatch {
  let (kind, audience, lessons) = match thread.visibility {
    Visibility::PublicProfessor { .. } => (
      NotificationKind::NewPublicThread,
      lessons.iter().map(|l| Target::Class(l.id)).collect(),
      lessons.to_vec(),
    ),
    Visibility::PublicClass { lesson } => (
      NotificationKind::NewClassThread,
      vec![Target::Class(lesson)],
      lessons.iter().filter(|l| l.id == lesson).cloned().collect(),
    ),
    Visibility::Private { recipient } => (
      NotificationKind::NewPrivateThread,
      recipient.map(Target::User).into_iter().collect(),
      Vec::new(),
    ),
  };

  Dispatch {
    kind,
    audience,
    params: NotificationParams {
      thread: ThreadRef { id: thread.id, title: thread.title.clone() },
      author: author.clone(),
      lessons,
      message_id: None,
      replier: None,
      redirect: thread_path(thread.id),
    },
  }
}

/// Route a reply. Same audience as the thread, except that in a private
/// thread the participant who did not just post is notified.
pub fn audience_for_new_message(
  thread: &Thread,
  message: &Message,
  thread_author: &UserSummary,
  replier: &UserSummary,
  lessons: &[LessonSummary],
) -> Dispatch {
  let mut dispatch = audience_for_new_thread(thread, thread_author, lessons);
  dispatch.kind = dispatch.kind.for_message();
  dispatch.params.message_id = Some(message.id);
  dispatch.params.replier = Some(replier.clone());
  dispatch.params.redirect =
    format!("{}#message-{}", thread_path(thread.id), message.id);

  if let Visibility::Private { .. } = thread.visibility
    && message.author_id != thread.author_id
  {
    dispatch.audience = vec![Target::User(thread.author_id)];
  }

  dispatch
}

/// Resolve the lesson summaries [`audience_for_new_thread`] routes through.
pub async fn routing_lessons<S: ForumStore>(
  store: &S,
  thread: &Thread,
) -> Result<Vec<LessonSummary>, S::Error> {
  let lessons = match thread.visibility {
    Visibility::PublicProfessor { professor } => {
      store.lessons_of_professor(professor).await?
    }
    Visibility::PublicClass { lesson } => {
      store.get_lesson(lesson).await?.into_iter().collect()
    }
    Visibility::Private { .. } => Vec::new(),
  };
  Ok(lessons.iter().map(|l| l.summary()).collect())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ids::ProfessorId;

  fn user(id: i64, name: &str) -> UserSummary {
    UserSummary { id: UserId(id), username: name.into(), display_name: name.into() }
  }

  fn lesson(id: i64, name: &str) -> LessonSummary {
    LessonSummary { id: LessonId(id), name: name.into() }
  }

  fn thread(author: i64, visibility: Visibility) -> Thread {
    let now = Utc::now();
    Thread {
      id:            ThreadId(7),
      title:         "Homework".into(),
      author_id:     UserId(author),
      visibility,
      section_id:    None,
      created_date:  now,
      modified_date: now,
    }
  }

  fn reply(author: i64) -> Message {
    let now = Utc::now();
    Message {
      id:            MessageId(70),
      thread_id:     ThreadId(7),
      author_id:     UserId(author),
      parent_id:     Some(MessageId(69)),
      content:       "thanks".into(),
      created_date:  now,
      modified_date: now,
    }
  }

  fn targets(d: &Dispatch) -> Vec<String> {
    d.audience.iter().map(ToString::to_string).collect()
  }

  #[test]
  fn public_thread_reaches_every_class_of_the_professor() {
    // Student S (enrolled in L1 only) writes publicly to P, who teaches L1
    // and L2.
    let t = thread(1, Visibility::PublicProfessor { professor: ProfessorId(3) });
    let taught = [lesson(1, "English"), lesson(2, "French")];
    let d = audience_for_new_thread(&t, &user(1, "s"), &taught);

    assert_eq!(d.kind, NotificationKind::NewPublicThread);
    assert_eq!(targets(&d), vec!["class:1", "class:2"]);
    assert_eq!(d.params.lessons.len(), 2);
    assert_eq!(d.params.redirect, "/forum/thread/7");
  }

  #[test]
  fn class_thread_reaches_its_lesson() {
    let t = thread(1, Visibility::PublicClass { lesson: LessonId(4) });
    let d = audience_for_new_thread(&t, &user(1, "s"), &[lesson(4, "Math")]);
    assert_eq!(d.kind, NotificationKind::NewClassThread);
    assert_eq!(targets(&d), vec!["class:4"]);
    assert_eq!(d.params.lessons, vec![lesson(4, "Math")]);
  }

  #[test]
  fn private_thread_reaches_its_recipient() {
    let t = thread(1, Visibility::Private { recipient: Some(UserId(2)) });
    let d = audience_for_new_thread(&t, &user(1, "a"), &[lesson(4, "ignored")]);
    assert_eq!(d.kind, NotificationKind::NewPrivateThread);
    assert_eq!(targets(&d), vec!["user:2"]);
    assert!(d.params.lessons.is_empty());
  }

  #[test]
  fn private_thread_without_recipient_has_no_audience() {
    let t = thread(1, Visibility::Private { recipient: None });
    assert!(audience_for_new_thread(&t, &user(1, "a"), &[]).audience.is_empty());
  }

  #[test]
  fn private_reply_from_recipient_goes_to_author() {
    let t = thread(1, Visibility::Private { recipient: Some(UserId(2)) });
    let d = audience_for_new_message(&t, &reply(2), &user(1, "a"), &user(2, "b"), &[]);
    assert_eq!(d.kind, NotificationKind::NewPrivateMessage);
    assert_eq!(targets(&d), vec!["user:1"]);
    assert_eq!(d.params.replier, Some(user(2, "b")));
    assert_eq!(d.params.message_id, Some(MessageId(70)));
  }

  #[test]
  fn private_reply_from_author_goes_to_recipient() {
    let t = thread(1, Visibility::Private { recipient: Some(UserId(2)) });
    let d = audience_for_new_message(&t, &reply(1), &user(1, "a"), &user(1, "a"), &[]);
    assert_eq!(targets(&d), vec!["user:2"]);
  }

  #[test]
  fn public_reply_keeps_thread_audience() {
    let t = thread(1, Visibility::PublicProfessor { professor: ProfessorId(3) });
    let taught = [lesson(1, "English"), lesson(2, "French")];
    let d = audience_for_new_message(&t, &reply(5), &user(1, "s"), &user(5, "p"), &taught);
    assert_eq!(d.kind, NotificationKind::NewPublicMessage);
    assert_eq!(targets(&d), vec!["class:1", "class:2"]);
    assert_eq!(d.params.redirect, "/forum/thread/7#message-70");
  }

  #[test]
  fn targets_parse_back() {
    assert_eq!("user:12".parse::<Target>(), Ok(Target::User(UserId(12))));
    assert_eq!("class:3".parse::<Target>(), Ok(Target::Class(LessonId(3))));
    assert!("group:3".parse::<Target>().is_err());
    assert!("user:abc".parse::<Target>().is_err());
  }

  #[test]
  fn wire_names() {
    assert_eq!(NotificationKind::NewClassMessage.to_string(), "new_class_forum_message");
    assert_eq!(
      serde_json::to_value(NotificationKind::NewPublicThread).unwrap(),
      serde_json::json!("new_public_forum_thread")
    );
    assert_eq!(
      "new_private_forum_thread".parse::<NotificationKind>(),
      Ok(NotificationKind::NewPrivateThread)
    );
    assert!("new_private_thread".parse::<NotificationKind>().is_err());
    assert_eq!(Medium::WebSocket.to_string(), "web-socket");
  }
}
