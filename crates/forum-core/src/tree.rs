//! The reply forest of one thread.
//!
//! Messages point at their parent; a [`ReplyTree`] indexes the other
//! direction once so that child lookups and recursive rendering do not go back
//! to the store. Sibling order is creation time, ties broken by id.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::{ids::MessageId, thread::Message};

/// A message and the subtrees of its direct replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyNode {
  pub message:  Message,
  pub children: Vec<ReplyNode>,
}

impl ReplyNode {
  /// Number of messages in this subtree, the root included.
  pub fn len(&self) -> usize {
    1 + self.children.iter().map(ReplyNode::len).sum::<usize>()
  }

  /// Message ids in depth-first pre-order.
  pub fn ids(&self) -> Vec<MessageId> {
    let mut out = Vec::with_capacity(self.len());
    self.collect_ids(&mut out);
    out
  }

  fn collect_ids(&self, out: &mut Vec<MessageId>) {
    out.push(self.message.id);
    for child in &self.children {
      child.collect_ids(out);
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct ReplyTree {
  /// Chronological.
  messages: Vec<Message>,
  index:    HashMap<MessageId, usize>,
  children: HashMap<MessageId, Vec<usize>>,
  roots:    Vec<usize>,
}

impl ReplyTree {
  /// Index the messages of a single thread. Input order does not matter.
  pub fn new(mut messages: Vec<Message>) -> Self {
    messages.sort_by(|a, b| {
      a.created_date.cmp(&b.created_date).then(a.id.cmp(&b.id))
    });

    let index: HashMap<MessageId, usize> =
      messages.iter().enumerate().map(|(i, m)| (m.id, i)).collect();

    let mut children: HashMap<MessageId, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for (i, message) in messages.iter().enumerate() {
      match message.parent_id {
        Some(parent) if index.contains_key(&parent) => {
          children.entry(parent).or_default().push(i);
        }
        // A parent outside this thread cannot be rendered under it.
        _ => roots.push(i),
      }
    }

    Self { messages, index, children, roots }
  }

  /// All messages, oldest first, regardless of tree shape.
  pub fn messages(&self) -> &[Message] { &self.messages }

  pub fn into_messages(self) -> Vec<Message> { self.messages }

  pub fn is_empty(&self) -> bool { self.messages.is_empty() }

  pub fn len(&self) -> usize { self.messages.len() }

  pub fn get(&self, id: MessageId) -> Option<&Message> {
    self.index.get(&id).map(|&i| &self.messages[i])
  }

  /// Direct replies of `id`, oldest first, optionally preceded by the
  /// message itself. Unknown ids yield an empty sequence.
  pub fn replies_of(&self, id: MessageId, include_self: bool) -> Vec<&Message> {
    let Some(&own) = self.index.get(&id) else {
      return Vec::new();
    };

    let mut out = Vec::new();
    if include_self {
      out.push(&self.messages[own]);
    }
    if let Some(kids) = self.children.get(&id) {
      out.extend(kids.iter().map(|&i| &self.messages[i]));
    }
    out
  }

  pub fn has_replies(&self, id: MessageId) -> bool {
    self.children.get(&id).is_some_and(|kids| !kids.is_empty())
  }

  /// The recursive subtree rooted at `id`.
  pub fn full_subtree(&self, id: MessageId) -> Option<ReplyNode> {
    let &root = self.index.get(&id)?;
    let mut seen = HashSet::new();
    Some(self.build(root, &mut seen))
  }

  /// One subtree per root message, oldest root first.
  pub fn forest(&self) -> Vec<ReplyNode> {
    let mut seen = HashSet::new();
    self.roots.iter().map(|&i| self.build(i, &mut seen)).collect()
  }

  fn build(&self, at: usize, seen: &mut HashSet<usize>) -> ReplyNode {
    seen.insert(at);
    let message = &self.messages[at];
    let children = self
      .children
      .get(&message.id)
      .map(|kids| {
        kids
          .iter()
          .filter(|&&k| !seen.contains(&k))
          .copied()
          .collect::<Vec<_>>()
      })
      .unwrap_or_default()
      .into_iter()
      .map(|k| self.build(k, seen))
      .collect();

    ReplyNode { message: message.clone(), children }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone, Utc};

  use super::*;
  use crate::ids::{ThreadId, UserId};

  fn msg(id: i64, parent: Option<i64>, minute: i64) -> Message {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
      + Duration::minutes(minute);
    Message {
      id:            MessageId(id),
      thread_id:     ThreadId(1),
      author_id:     UserId(1),
      parent_id:     parent.map(MessageId),
      content:       format!("message {id}"),
      created_date:  at,
      modified_date: at,
    }
  }

  fn ids(messages: &[&Message]) -> Vec<i64> {
    messages.iter().map(|m| m.id.0).collect()
  }

  #[test]
  fn replies_are_direct_children_in_creation_order() {
    // 1 ─┬─ 3
    //    └─ 2 ── 4
    let tree = ReplyTree::new(vec![
      msg(4, Some(2), 4),
      msg(3, Some(1), 1),
      msg(1, None, 0),
      msg(2, Some(1), 2),
    ]);

    assert_eq!(ids(&tree.replies_of(MessageId(1), false)), vec![3, 2]);
    assert_eq!(ids(&tree.replies_of(MessageId(1), true)), vec![1, 3, 2]);
    assert!(tree.replies_of(MessageId(4), false).is_empty());
    assert!(tree.has_replies(MessageId(2)));
    assert!(!tree.has_replies(MessageId(3)));
  }

  #[test]
  fn messages_are_chronological_regardless_of_shape() {
    let tree = ReplyTree::new(vec![
      msg(4, Some(2), 4),
      msg(3, Some(1), 1),
      msg(1, None, 0),
      msg(2, Some(1), 2),
    ]);
    let order: Vec<i64> = tree.messages().iter().map(|m| m.id.0).collect();
    assert_eq!(order, vec![1, 3, 2, 4]);
  }

  #[test]
  fn simultaneous_messages_order_by_id() {
    let tree = ReplyTree::new(vec![msg(9, None, 0), msg(5, None, 0)]);
    let order: Vec<i64> = tree.messages().iter().map(|m| m.id.0).collect();
    assert_eq!(order, vec![5, 9]);
  }

  #[test]
  fn full_subtree_visits_each_message_once() {
    let tree = ReplyTree::new(vec![
      msg(1, None, 0),
      msg(2, Some(1), 1),
      msg(3, Some(2), 2),
      msg(4, Some(2), 3),
      msg(5, Some(1), 4),
      msg(6, None, 5),
    ]);

    let node = tree.full_subtree(MessageId(1)).unwrap();
    assert_eq!(node.ids(), vec![1, 2, 3, 4, 5].into_iter().map(MessageId).collect::<Vec<_>>());
    assert_eq!(node.len(), 5);
    assert_eq!(node.children[0].children.len(), 2);

    let leaf = tree.full_subtree(MessageId(4)).unwrap();
    assert!(leaf.children.is_empty());
  }

  #[test]
  fn forest_has_one_tree_per_root() {
    let tree = ReplyTree::new(vec![
      msg(1, None, 0),
      msg(2, Some(1), 1),
      msg(3, None, 2),
    ]);
    let forest = tree.forest();
    assert_eq!(forest.len(), 2);
    assert_eq!(forest[0].len() + forest[1].len(), tree.len());
  }

  #[test]
  fn empty_thread_traverses_to_nothing() {
    let tree = ReplyTree::new(Vec::new());
    assert!(tree.is_empty());
    assert!(tree.forest().is_empty());
    assert!(tree.replies_of(MessageId(1), true).is_empty());
    assert!(tree.full_subtree(MessageId(1)).is_none());
  }
}
