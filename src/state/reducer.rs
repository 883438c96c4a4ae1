//! Every valid transition of a [`GameState`], each a pure function from the
//! previous state to the next one.
//!
//! Invalid requests (wrong turn, unknown names, bad reorder) return an
//! unchanged copy of the state: they are silent no-ops, never errors.

use std::collections::HashSet;

use rand::{Rng, seq::SliceRandom};

use crate::state::game::{GameState, Item, ItemUpdate, NewItem, Participant};

/// Append an item under the given id. Empty optional fields are dropped.
pub fn add_item(state: &GameState, id: String, item: NewItem) -> GameState {
    let mut next = state.clone();
    next.items.push(Item {
        id,
        name: item.name,
        description: item.description.filter(|value| !value.is_empty()),
        picked_by: None,
        image_url: item.image_url.filter(|value| !value.is_empty()),
    });
    next
}

pub fn update_item(state: &GameState, id: &str, updates: ItemUpdate) -> GameState {
    let mut next = state.clone();
    let Some(item) = next.items.iter_mut().find(|item| item.id == id) else {
        return next;
    };

    if let Some(name) = updates.name {
        item.name = name;
    }
    if let Some(description) = updates.description {
        item.description = Some(description);
    }
    if let Some(image_url) = updates.image_url {
        item.image_url = Some(image_url);
    }
    if let Some(picked_by) = updates.picked_by {
        item.picked_by = Some(picked_by);
    }
    next
}

pub fn delete_item(state: &GameState, id: &str) -> GameState {
    let mut next = state.clone();
    next.items.retain(|item| item.id != id);
    next
}

/// Add a participant unless the name is empty or already taken.
///
/// Regular participants join at the end of the turn order. The organizer is
/// dropped into a uniformly random slot among `len + 1` so they are not
/// predictably first or last.
pub fn add_participant<R>(state: &GameState, name: &str, is_organizer: bool, rng: &mut R) -> GameState
where
    R: Rng + ?Sized,
{
    let mut next = state.clone();
    if name.is_empty() || state.participant(name).is_some() {
        return next;
    }

    let participant = Participant::new(name, is_organizer);
    if is_organizer {
        let slot = rng.random_range(0..=next.participants.len());
        next.participants.insert(slot, participant);
    } else {
        next.participants.push(participant);
    }
    next
}

/// Shuffle the turn order (Fisher-Yates) and hand the turn to the new first player.
pub fn randomize_participants<R>(state: &GameState, rng: &mut R) -> GameState
where
    R: Rng + ?Sized,
{
    let mut next = state.clone();
    if next.participants.len() <= 1 {
        return next;
    }

    next.participants.shuffle(rng);
    next.current_turn_index = 0;
    next
}

/// Rearrange participants into `new_order`, given by name.
///
/// Accepted only when `new_order` is a permutation of the current names;
/// the existing participant records are kept and the turn goes back to the
/// first player.
pub fn reorder_participants(state: &GameState, new_order: &[String]) -> GameState {
    let mut next = state.clone();
    if !is_permutation_of(&state.participants, new_order) {
        return next;
    }

    next.participants = new_order
        .iter()
        .filter_map(|name| state.participant(name).cloned())
        .collect();
    next.current_turn_index = 0;
    next
}

fn is_permutation_of(participants: &[Participant], names: &[String]) -> bool {
    if participants.len() != names.len() {
        return false;
    }
    let requested = names.iter().map(String::as_str).collect::<HashSet<_>>();
    if requested.len() != names.len() {
        return false;
    }
    participants
        .iter()
        .all(|participant| requested.contains(participant.name.as_str()))
}

/// Remove a participant from the turn order.
///
/// The turn index is left as is: it may now name another player or point
/// past the end of the order until the organizer sets it again.
pub fn remove_participant(state: &GameState, name: &str) -> GameState {
    let mut next = state.clone();
    next.participants.retain(|participant| participant.name != name);
    next
}

/// Mark the game started and give the turn to the first participant. Idempotent.
pub fn start_game(state: &GameState) -> GameState {
    let mut next = state.clone();
    next.started = true;
    next.current_turn_index = 0;
    next
}

/// Let the current player take an item, then pass the turn.
///
/// No-op unless `participant_name` is the player whose turn it is and the
/// item exists and is still available.
pub fn pick_item(state: &GameState, participant_name: &str, item_id: &str) -> GameState {
    let mut next = state.clone();
    let is_their_turn = state
        .participants
        .get(state.current_turn_index)
        .is_some_and(|current| current.name == participant_name);
    let is_available = state.item(item_id).is_some_and(|item| !item.is_picked());
    if !is_their_turn || !is_available {
        return next;
    }

    if let Some(item) = next.items.iter_mut().find(|item| item.id == item_id) {
        item.picked_by = Some(participant_name.to_string());
    }
    if let Some(participant) = next.participants.get_mut(state.current_turn_index) {
        participant.items_picked.push(item_id.to_string());
    }
    next.current_turn_index = (state.current_turn_index + 1) % next.participants.len();
    next
}

/// Pass the turn to the next participant regardless of who is playing.
///
/// An out-of-range index is first brought back into the order.
pub fn skip_turn(state: &GameState) -> GameState {
    let mut next = state.clone();
    let count = next.participants.len();
    if count == 0 {
        return next;
    }
    next.current_turn_index = (state.current_turn_index % count + 1) % count;
    next
}

pub fn toggle_auto_skip(state: &GameState, name: &str) -> GameState {
    let mut next = state.clone();
    if let Some(participant) = next.participants.iter_mut().find(|p| p.name == name) {
        participant.auto_skip = !participant.auto_skip;
    }
    next
}

/// Overwrite the turn index. Not bounds-checked: an out-of-range index simply
/// means nobody's turn until it is set again.
pub fn set_current_turn_index(state: &GameState, index: usize) -> GameState {
    let mut next = state.clone();
    next.current_turn_index = index;
    next
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn game() -> GameState {
        GameState::new("g1", 0, Duration::from_secs(60))
    }

    fn with_participants(names: &[&str]) -> GameState {
        let mut state = game();
        state.participants = names.iter().map(|n| Participant::new(*n, false)).collect();
        state
    }

    fn with_items(mut state: GameState, ids: &[&str]) -> GameState {
        for id in ids {
            state = add_item(
                &state,
                id.to_string(),
                NewItem {
                    name: format!("item {id}"),
                    ..NewItem::default()
                },
            );
        }
        state
    }

    fn names(state: &GameState) -> Vec<&str> {
        state.participants.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn add_item_keeps_only_provided_optional_fields() {
        let state = add_item(
            &game(),
            "i1".into(),
            NewItem {
                name: "Teapot".into(),
                description: Some(String::new()),
                image_url: Some("https://img/teapot.png".into()),
            },
        );

        let item = &state.items[0];
        assert_eq!(item.id, "i1");
        assert_eq!(item.description, None);
        assert_eq!(item.image_url.as_deref(), Some("https://img/teapot.png"));
        assert_eq!(item.picked_by, None);
    }

    #[test]
    fn update_item_merges_provided_fields_only() {
        let state = with_items(game(), &["i1"]);
        let updated = update_item(
            &state,
            "i1",
            ItemUpdate {
                description: Some("blue".into()),
                ..ItemUpdate::default()
            },
        );

        assert_eq!(updated.items[0].name, "item i1");
        assert_eq!(updated.items[0].description.as_deref(), Some("blue"));
        assert_eq!(update_item(&state, "missing", ItemUpdate::default()), state);
    }

    #[test]
    fn delete_item_is_idempotent() {
        let state = with_items(game(), &["i1", "i2"]);
        let once = delete_item(&state, "i1");
        let twice = delete_item(&once, "i1");

        assert_eq!(once, twice);
        assert_eq!(once.items.len(), 1);
        assert_eq!(once.items[0].id, "i2");
    }

    #[test]
    fn organizer_on_empty_list_lands_first_then_others_append() {
        let mut rng = StdRng::seed_from_u64(7);
        let state = add_participant(&game(), "A", true, &mut rng);
        let state = add_participant(&state, "B", false, &mut rng);

        assert_eq!(names(&state), ["A", "B"]);
        assert!(state.participants[0].is_organizer);
        assert!(!state.participants[1].auto_skip);
        assert!(state.participants[1].items_picked.is_empty());
    }

    #[test]
    fn add_participant_ignores_empty_and_duplicate_names() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = with_participants(&["A"]);

        assert_eq!(add_participant(&state, "", false, &mut rng), state);
        assert_eq!(add_participant(&state, "A", true, &mut rng), state);
        assert_eq!(names(&add_participant(&state, "a", false, &mut rng)), ["A", "a"]);
    }

    #[test]
    fn organizer_slot_covers_every_position() {
        let state = with_participants(&["A", "B"]);
        let mut seen = HashSet::new();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let next = add_participant(&state, "Org", true, &mut rng);
            let slot = next.participants.iter().position(|p| p.name == "Org").unwrap();
            seen.insert(slot);
        }
        assert_eq!(seen, HashSet::from([0, 1, 2]));
    }

    #[test]
    fn randomize_is_a_noop_for_a_single_participant() {
        let mut state = with_participants(&["A"]);
        state.current_turn_index = 3;
        let mut rng = StdRng::seed_from_u64(3);

        assert_eq!(randomize_participants(&state, &mut rng), state);
    }

    #[test]
    fn reorder_requires_exact_permutation() {
        let mut state = with_participants(&["A", "B", "C"]);
        state.current_turn_index = 2;
        state.participants[1].items_picked.push("i9".into());

        let order = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();

        let reordered = reorder_participants(&state, &order(&["C", "B", "A"]));
        assert_eq!(names(&reordered), ["C", "B", "A"]);
        assert_eq!(reordered.current_turn_index, 0);
        assert_eq!(reordered.participants[1].items_picked, ["i9"]);

        for bad in [
            order(&["A", "B"]),
            order(&["A", "B", "D"]),
            order(&["A", "A", "B"]),
            order(&["A", "B", "C", "C"]),
        ] {
            assert_eq!(reorder_participants(&state, &bad), state, "{bad:?}");
        }
    }

    #[test]
    fn remove_participant_leaves_turn_index_alone() {
        let mut state = with_participants(&["A", "B", "C"]);
        state.current_turn_index = 2;

        let next = remove_participant(&state, "A");
        assert_eq!(names(&next), ["B", "C"]);
        assert_eq!(next.current_turn_index, 2);
        assert!(next.participants.get(next.current_turn_index).is_none());
    }

    #[test]
    fn removing_current_player_hands_the_slot_to_the_next_one() {
        let mut state = with_participants(&["A", "B", "C"]);
        state.current_turn_index = 1;
        let next = remove_participant(&state, "B");
        assert_eq!(next.current_turn_index, 1);
        assert_eq!(next.participants[1].name, "C");

        let only = with_participants(&["A"]);
        let empty = remove_participant(&only, "A");
        assert!(empty.participants.is_empty());
        assert_eq!(empty.current_turn_index, 0);

        state.current_turn_index = 2;
        assert_eq!(remove_participant(&state, "Z"), state);
    }

    #[test]
    fn skip_from_an_overflowing_index_wraps_into_the_order() {
        let state = set_current_turn_index(&with_participants(&["A", "B"]), usize::MAX);

        let skipped = skip_turn(&state);
        assert_eq!(skipped.current_turn_index, 0);
        assert_eq!(skip_turn(&set_current_turn_index(&state, 5)).current_turn_index, 0);
    }

    #[test]
    fn start_game_always_resets_turn() {
        let mut state = with_participants(&["A", "B"]);
        state.current_turn_index = 1;

        let started = start_game(&state);
        assert!(started.started);
        assert_eq!(started.current_turn_index, 0);

        let mut again = started.clone();
        again.current_turn_index = 1;
        assert_eq!(start_game(&again), started);
    }

    #[test]
    fn pick_out_of_turn_is_a_noop_then_in_turn_pick_advances() {
        let state = with_items(with_participants(&["A", "B", "C"]), &["x"]);

        assert_eq!(pick_item(&state, "B", "x"), state);

        let picked = pick_item(&state, "A", "x");
        assert_eq!(picked.items[0].picked_by.as_deref(), Some("A"));
        assert_eq!(picked.participants[0].items_picked, ["x"]);
        assert_eq!(picked.current_turn_index, 1);
    }

    #[test]
    fn pick_ignores_unknown_or_taken_items() {
        let state = with_items(with_participants(&["A", "B"]), &["x"]);
        let picked = pick_item(&state, "A", "x");

        assert_eq!(pick_item(&picked, "B", "x"), picked);
        assert_eq!(pick_item(&picked, "B", "nope"), picked);
    }

    #[test]
    fn pick_wraps_turn_after_last_participant() {
        let mut state = with_items(with_participants(&["A", "B"]), &["x"]);
        state.current_turn_index = 1;

        assert_eq!(pick_item(&state, "B", "x").current_turn_index, 0);
    }

    #[test]
    fn skip_turn_wraps_and_ignores_empty_games() {
        let mut state = with_participants(&["A", "B", "C"]);
        state.current_turn_index = 2;
        assert_eq!(skip_turn(&state).current_turn_index, 0);

        assert_eq!(skip_turn(&game()), game());
    }

    #[test]
    fn toggle_auto_skip_flips_flag() {
        let state = with_participants(&["A", "B"]);
        let toggled = toggle_auto_skip(&state, "B");
        assert!(toggled.participants[1].auto_skip);
        assert!(!toggle_auto_skip(&toggled, "B").participants[1].auto_skip);
    }

    #[test]
    fn set_current_turn_index_is_unchecked() {
        let state = with_participants(&["A"]);
        assert_eq!(set_current_turn_index(&state, 5).current_turn_index, 5);
    }

    fn participant_names() -> impl Strategy<Value = Vec<String>> {
        prop::collection::hash_set("[A-E][a-z]{0,3}", 0..6)
            .prop_map(|names| names.into_iter().collect())
    }

    proptest! {
        #[test]
        fn pick_only_mutates_on_the_current_players_turn(
            roster in participant_names(),
            index in 0usize..8,
            picker in "[A-E][a-z]{0,3}",
        ) {
            let refs = roster.iter().map(String::as_str).collect::<Vec<_>>();
            let mut state = with_items(with_participants(&refs), &["x"]);
            state.current_turn_index = index;

            let next = pick_item(&state, &picker, "x");
            let current = state.participants.get(index).map(|p| p.name.as_str());
            if current == Some(picker.as_str()) {
                prop_assert_eq!(next.current_turn_index, (index + 1) % roster.len());
                prop_assert_eq!(next.items[0].picked_by.as_deref(), Some(picker.as_str()));
            } else {
                prop_assert_eq!(next, state);
            }
        }

        #[test]
        fn skip_advances_modulo_participant_count(
            roster in participant_names().prop_filter("non-empty", |r| !r.is_empty()),
            index in any::<usize>(),
        ) {
            let refs = roster.iter().map(String::as_str).collect::<Vec<_>>();
            let state = set_current_turn_index(&with_participants(&refs), index);

            let next = skip_turn(&state);
            prop_assert_eq!(next.current_turn_index, (index % roster.len() + 1) % roster.len());
        }

        #[test]
        fn randomize_preserves_participants(roster in participant_names(), seed in any::<u64>()) {
            let refs = roster.iter().map(String::as_str).collect::<Vec<_>>();
            let mut state = with_participants(&refs);
            state.current_turn_index = 1;
            let mut rng = StdRng::seed_from_u64(seed);

            let next = randomize_participants(&state, &mut rng);
            let mut before = names(&state);
            let mut after = names(&next);
            before.sort_unstable();
            after.sort_unstable();
            prop_assert_eq!(before, after);
            if roster.len() > 1 {
                prop_assert_eq!(next.current_turn_index, 0);
            }
        }

        #[test]
        fn reorder_applies_iff_permutation(
            roster in participant_names(),
            requested in prop::collection::vec("[A-E][a-z]{0,3}", 0..6),
        ) {
            let refs = roster.iter().map(String::as_str).collect::<Vec<_>>();
            let state = with_participants(&refs);

            let mut current = roster.clone();
            let mut wanted = requested.clone();
            current.sort();
            wanted.sort();

            let next = reorder_participants(&state, &requested);
            if current == wanted {
                prop_assert_eq!(names(&next), requested.iter().map(String::as_str).collect::<Vec<_>>());
            } else {
                prop_assert_eq!(next, state);
            }
        }

        #[test]
        fn item_ids_stay_unique_across_adds_and_deletes(
            ops in prop::collection::vec((any::<bool>(), 0usize..4), 0..20),
        ) {
            let mut state = game();
            let mut counter = 0;
            for (add, target) in ops {
                if add {
                    counter += 1;
                    state = add_item(&state, format!("i{counter}"), NewItem::default());
                } else if let Some(id) = state.items.get(target).map(|item| item.id.clone()) {
                    state = delete_item(&state, &id);
                    prop_assert_eq!(delete_item(&state, &id), state.clone());
                }
            }
            let ids = state.items.iter().map(|item| item.id.as_str()).collect::<HashSet<_>>();
            prop_assert_eq!(ids.len(), state.items.len());
        }
    }
}
