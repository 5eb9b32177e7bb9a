use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::engine::lifecycle::Transition;

/// Cache scopes a transition can dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationScope {
    /// The submitter's own-list entries for the affected kind.
    OwnList,
    /// Every list entry of the affected kind (reviewer collections included).
    KindLists,
    /// The detail-by-id entry of the affected request.
    Detail,
}

/// Declarative consistency contract: which scopes each transition
/// invalidates. The query layer walks this table after the store confirms a
/// mutation; nothing is flipped optimistically beforehand. Conversion applies
/// its row to both the home-visit and sick-leave kinds.
static INVALIDATION_TABLE: Lazy<HashMap<Transition, &'static [InvalidationScope]>> =
    Lazy::new(|| {
        use InvalidationScope::*;
        HashMap::from([
            (Transition::Create, &[OwnList] as &'static [_]),
            (Transition::Assign, &[OwnList]),
            (Transition::Accept, &[KindLists, Detail, OwnList]),
            (Transition::Reject, &[KindLists, Detail, OwnList]),
            (Transition::Update, &[KindLists, Detail, OwnList]),
            (Transition::Delete, &[KindLists, Detail, OwnList]),
            (Transition::ConvertToSick, &[KindLists, Detail, OwnList]),
        ])
    });

pub fn scopes_for(transition: Transition) -> &'static [InvalidationScope] {
    INVALIDATION_TABLE
        .get(&transition)
        .copied()
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_transition_has_a_row() {
        for transition in [
            Transition::Create,
            Transition::Assign,
            Transition::Accept,
            Transition::Reject,
            Transition::Update,
            Transition::Delete,
            Transition::ConvertToSick,
        ] {
            assert!(
                !scopes_for(transition).is_empty(),
                "no invalidation row for {transition}"
            );
        }
    }

    #[test]
    fn creations_touch_only_own_lists() {
        assert_eq!(scopes_for(Transition::Create), &[InvalidationScope::OwnList]);
        assert_eq!(scopes_for(Transition::Assign), &[InvalidationScope::OwnList]);
    }

    #[test]
    fn reviews_touch_kind_lists_and_detail() {
        for transition in [Transition::Accept, Transition::Reject, Transition::Delete] {
            let scopes = scopes_for(transition);
            assert!(scopes.contains(&InvalidationScope::KindLists));
            assert!(scopes.contains(&InvalidationScope::Detail));
        }
    }
}
