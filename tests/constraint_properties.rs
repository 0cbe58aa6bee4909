//! Algebraic properties of constraint matching

use config_synth::constraint::{ExactMatcher, GlobMatcher};
use config_synth::{match_constraints, match_constraints_with, Constraint, TagMatcher};
use proptest::prelude::*;

fn tag_list() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z]{1,6}", 0..6)
}

proptest! {
    #[test]
    fn prop_glob_without_wildcard_is_equality(pattern in "[a-z.-]{0,8}", tag in "[a-z.-]{0,8}") {
        prop_assert_eq!(
            GlobMatcher.matches(&pattern, &tag),
            ExactMatcher.matches(&pattern, &tag)
        );
    }

    #[test]
    fn prop_star_suffix_matches_every_extension(prefix in "[a-z]{0,6}", rest in "[a-z-]{0,6}") {
        let pattern = format!("{}*", prefix);
        let tag = format!("{}{}", prefix, rest);
        prop_assert!(GlobMatcher.matches(&pattern, &tag));
    }

    #[test]
    fn prop_no_constraints_always_match(tags in tag_list()) {
        prop_assert_eq!(match_constraints(&tags, &[]), (true, None));
    }

    #[test]
    fn prop_must_match_own_tag_passes(tags in tag_list(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!tags.is_empty());
        let chosen = pick.get(&tags).clone();
        let constraints = vec![Constraint::must_match(chosen.clone())];
        prop_assert_eq!(match_constraints(&tags, &constraints), (true, None));

        let negated = vec![Constraint::must_not_match(chosen)];
        let (matched, failing) = match_constraints(&tags, &negated);
        prop_assert!(!matched);
        prop_assert_eq!(failing, Some(&negated[0]));
    }

    #[test]
    fn prop_result_is_conjunction(tags in tag_list(), patterns in proptest::collection::vec(("[a-z]{1,3}\\*?", any::<bool>()), 0..4)) {
        let constraints: Vec<Constraint> = patterns
            .into_iter()
            .map(|(p, must)| if must { Constraint::must_match(p) } else { Constraint::must_not_match(p) })
            .collect();
        let (matched, failing) = match_constraints_with(&tags, &constraints, &GlobMatcher);

        let first_failing = constraints
            .iter()
            .find(|c| c.matches_at_least_one_tag(&tags, &GlobMatcher) != c.must_match);
        prop_assert_eq!(failing, first_failing);
        prop_assert_eq!(matched, first_failing.is_none());
    }

    #[test]
    fn prop_constraint_text_parses_back(pattern in "[a-z*.=!-]{0,10}", must in any::<bool>()) {
        let constraint = if must {
            Constraint::must_match(pattern)
        } else {
            Constraint::must_not_match(pattern)
        };
        let parsed: Constraint = constraint.to_string().parse().unwrap();
        prop_assert_eq!(parsed, constraint);
    }
}
