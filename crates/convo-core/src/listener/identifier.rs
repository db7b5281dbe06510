use crate::domain::{MessageId, Peer};

/// One dimension of an [`Identifier`].
///
/// On a pattern, `Any` is a wildcard. On a candidate built from an event,
/// `Any` means the event does not expose that dimension.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Field<T> {
    #[default]
    Any,
    One(T),
    AnyOf(Vec<T>),
}

impl<T: PartialEq> Field<T> {
    /// Collapses a list into the narrowest variant (`[]` is `Any`).
    pub fn from_values(mut values: Vec<T>) -> Self {
        match values.len() {
            0 => Field::Any,
            1 => Field::One(values.remove(0)),
            _ => Field::AnyOf(values),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Field::Any)
    }

    pub fn values(&self) -> &[T] {
        match self {
            Field::Any => &[],
            Field::One(v) => std::slice::from_ref(v),
            Field::AnyOf(vs) => vs,
        }
    }

    /// The first concrete value, if any.
    pub fn first(&self) -> Option<&T> {
        self.values().first()
    }

    /// `self` is the pattern, `candidate` the observed value(s).
    pub fn matches(&self, candidate: &Field<T>) -> bool {
        if self.is_any() {
            return true;
        }
        let wanted = self.values();
        candidate.values().iter().any(|v| wanted.contains(v))
    }
}

impl<T> From<Vec<T>> for Field<T>
where
    T: PartialEq,
{
    fn from(values: Vec<T>) -> Self {
        Field::from_values(values)
    }
}

impl From<Peer> for Field<Peer> {
    fn from(p: Peer) -> Self {
        Field::One(p)
    }
}

impl From<i64> for Field<Peer> {
    fn from(id: i64) -> Self {
        Field::One(Peer::Id(id))
    }
}

impl From<&str> for Field<Peer> {
    fn from(name: &str) -> Self {
        Field::One(Peer::username(name))
    }
}

impl From<MessageId> for Field<MessageId> {
    fn from(id: MessageId) -> Self {
        Field::One(id)
    }
}

/// Matching predicate over the provenance of an inbound event.
///
/// Built with the consuming `with_*` methods and never mutated afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identifier {
    pub from_user_id: Field<Peer>,
    pub chat_id: Field<Peer>,
    pub message_id: Field<MessageId>,
    pub inline_message_id: Field<String>,
}

impl Identifier {
    /// Matches every event.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_chat(mut self, chat: impl Into<Field<Peer>>) -> Self {
        self.chat_id = chat.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<Field<Peer>>) -> Self {
        self.from_user_id = user.into();
        self
    }

    pub fn with_message(mut self, message_id: impl Into<Field<MessageId>>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn with_inline_message(mut self, inline_message_id: impl Into<String>) -> Self {
        self.inline_message_id = Field::One(inline_message_id.into());
        self
    }

    pub fn chat(chat: impl Into<Field<Peer>>) -> Self {
        Self::any().with_chat(chat)
    }

    pub fn user(user: impl Into<Field<Peer>>) -> Self {
        Self::any().with_user(user)
    }

    /// True when every dimension of `self` accepts the matching dimension of `candidate`.
    pub fn matches(&self, candidate: &Identifier) -> bool {
        self.from_user_id.matches(&candidate.from_user_id)
            && self.chat_id.matches(&candidate.chat_id)
            && self.message_id.matches(&candidate.message_id)
            && self.inline_message_id.matches(&candidate.inline_message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(chat: i64, user: i64) -> Identifier {
        Identifier {
            from_user_id: Field::One(Peer::Id(user)),
            chat_id: Field::One(Peer::Id(chat)),
            message_id: Field::One(MessageId(1)),
            inline_message_id: Field::Any,
        }
    }

    #[test]
    fn wildcard_matches_anything_including_absent() {
        let pattern = Identifier::any();
        assert!(pattern.matches(&event(100, 7)));
        assert!(pattern.matches(&Identifier::any()));
    }

    #[test]
    fn constrained_dimension_fails_when_candidate_lacks_it() {
        let pattern = Identifier::any().with_inline_message("AAE");
        assert!(!pattern.matches(&event(100, 7)));

        let pattern = Identifier::chat(Peer::Id(100));
        let inline_click = Identifier::any().with_inline_message("AAE");
        assert!(!pattern.matches(&inline_click));
    }

    #[test]
    fn chat_scenarios() {
        let ev = event(100, 7);
        assert!(Identifier::chat(Peer::Id(100)).matches(&ev));
        assert!(Identifier::chat(vec![Peer::Id(100), Peer::Id(200)]).matches(&ev));
        assert!(!Identifier::chat(Peer::Id(300)).matches(&ev));
    }

    #[test]
    fn set_membership_is_exact_equality() {
        let pattern = Identifier::user(vec![Peer::Id(1), Peer::Id(2)]);
        assert!(pattern.matches(&event(0, 2)));
        assert!(!pattern.matches(&event(0, 3)));

        // No coercion between numeric ids and usernames.
        let by_name = Identifier::user(Peer::Username("7".to_string()));
        assert!(!by_name.matches(&event(0, 7)));
    }

    #[test]
    fn candidate_sets_intersect_with_pattern() {
        let candidate = Identifier::any()
            .with_chat(vec![Peer::Id(100), Peer::username("somegroup")]);
        assert!(Identifier::chat("@somegroup").matches(&candidate));
        assert!(Identifier::chat(Peer::Id(100)).matches(&candidate));
        assert!(!Identifier::chat("othergroup").matches(&candidate));
    }

    #[test]
    fn all_dimensions_must_pass() {
        let pattern = Identifier::chat(Peer::Id(100)).with_user(Peer::Id(8));
        assert!(!pattern.matches(&event(100, 7)));
        assert!(Identifier::chat(Peer::Id(100)).with_user(Peer::Id(7)).matches(&event(100, 7)));
    }

    #[test]
    fn from_values_collapses() {
        assert_eq!(Field::<i32>::from_values(vec![]), Field::Any);
        assert_eq!(Field::from_values(vec![1]), Field::One(1));
        assert_eq!(Field::from_values(vec![1, 2]), Field::AnyOf(vec![1, 2]));
        assert_eq!(Field::AnyOf(vec![3, 4]).first(), Some(&3));
    }
}
