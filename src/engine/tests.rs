use crate::distribution::{Dialect, DistributionEntry, DistributionFile, DistributionTarget, FormFilter, KeywordFilter};
use crate::form::{FormIndex, FormKey, FormKind, FormRecord};
use crate::npc::NpcFilterData;
use crate::parser::{RuleSource, parse};
use crate::{Context, Error, Options, ResolutionReport, TargetCategory, resolve_with};

use super::{CancellationToken, aggregate, matches};

fn key(text: &str) -> FormKey {
    text.parse().unwrap()
}

fn forms() -> FormIndex {
    let record = |k: &str, edid: &str, kind| FormRecord { form_key: key(k), editor_id: Some(edid.into()), kind };
    FormIndex::from_records([
        record("Guards.esp|800", "OutfitX", FormKind::Outfit),
        record("Guards.esp|801", "OutfitY", FormKind::Outfit),
        record("Guards.esp|802", "OutfitZ", FormKind::Outfit),
        record("Skyrim.esm|28848", "GuardFaction", FormKind::Faction),
        record("Skyrim.esm|13746", "NordRace", FormKind::Race),
        record("Skyrim.esm|13794", "ActorTypeNPC", FormKind::Keyword),
    ])
}

fn spid(name: &str, content: &str, forms: &FormIndex) -> DistributionFile {
    parse(&RuleSource::named(name, Dialect::Spid), content, forms)
}

fn skypatcher(name: &str, content: &str, forms: &FormIndex) -> DistributionFile {
    parse(&RuleSource::named(name, Dialect::SkyPatcher), content, forms)
}

fn guard(id: &str) -> NpcFilterData {
    let mut npc = NpcFilterData::new(key(id));
    npc.factions.insert(key("Skyrim.esm|28848"));
    npc.race = Some(key("Skyrim.esm|13746"));
    npc
}

fn civilian(id: &str) -> NpcFilterData {
    let mut npc = NpcFilterData::new(key(id));
    npc.race = Some(key("Skyrim.esm|13746"));
    npc
}

fn run(files: &[DistributionFile], npcs: &[NpcFilterData], forms: &FormIndex) -> ResolutionReport {
    resolve_with(files, npcs, &Context::new(forms), &Options::default()).unwrap()
}

#[test]
fn faction_override_on_top_of_global_rule() {
    let forms = forms();
    let files = vec![
        spid("A_DISTR.ini", "Outfit = OutfitX", &forms),
        spid("B_DISTR.ini", "Outfit = OutfitY|NONE|GuardFaction", &forms),
    ];
    let npcs = vec![guard("Skyrim.esm|A1"), civilian("Skyrim.esm|B1")];

    let report = run(&files, &npcs, &forms);
    assert_eq!(report.assignments.len(), 2);

    let g = report.assignment(&key("Skyrim.esm|A1")).unwrap();
    assert_eq!(g.final_outfit, Some(key("Guards.esp|801")));
    assert_eq!(g.final_outfit_editor_id.as_deref(), Some("OutfitY"));
    assert!(g.has_conflict);
    assert_eq!(g.distributions.len(), 2);
    assert!(!g.distributions[0].is_winner);
    assert!(g.distributions[0].targets_all_npcs);
    assert!(g.distributions[1].is_winner);
    assert!(g.distributions[1].uses_faction_targeting);
    assert_eq!(g.distributions[1].file_name, "B_DISTR.ini");
    assert_eq!(g.distributions[1].targeting_description, "Factions: GuardFaction");

    let c = report.assignment(&key("Skyrim.esm|B1")).unwrap();
    assert_eq!(c.final_outfit, Some(key("Guards.esp|800")));
    assert!(!c.has_conflict);
    assert_eq!(c.distributions.len(), 1);
    assert!(c.distributions[0].is_winner);
}

#[test]
fn chance_is_recorded_but_never_rolled() {
    let forms = forms();
    let files = vec![
        spid("A_DISTR.ini", "Outfit = OutfitX|NONE|NONE|NONE|NONE|NONE|40", &forms),
        spid("B_DISTR.ini", "Outfit = OutfitY|NONE|GuardFaction", &forms),
    ];
    let npcs = vec![guard("Skyrim.esm|A1"), civilian("Skyrim.esm|B1")];

    let report = run(&files, &npcs, &forms);

    for assignment in &report.assignments {
        let chanced = assignment.distributions.iter().find(|d| d.chance.is_some()).unwrap();
        assert_eq!(chanced.chance, Some(40.0));
        assert_eq!(chanced.target, DistributionTarget::Outfit(key("Guards.esp|800")));
    }
    let civ = report.assignment(&key("Skyrim.esm|B1")).unwrap();
    assert!(civ.distributions[0].is_winner);
    let grd = report.assignment(&key("Skyrim.esm|A1")).unwrap();
    assert!(!grd.distributions[0].is_winner);
}

#[test]
fn last_loaded_entry_wins() {
    let forms = forms();
    // (file contents in load order, expected winning outfit)
    let cases: Vec<(Vec<(&str, &str)>, &str)> = vec![
        (vec![("A_DISTR.ini", "Outfit = OutfitX"), ("B_DISTR.ini", "Outfit = OutfitY")], "OutfitY"),
        (vec![("A_DISTR.ini", "Outfit = OutfitY"), ("B_DISTR.ini", "Outfit = OutfitX")], "OutfitX"),
        (vec![("A_DISTR.ini", "Outfit = OutfitX\nOutfit = OutfitZ")], "OutfitZ"),
        (vec![("A_DISTR.ini", "Outfit = OutfitZ|NONE|GuardFaction\nOutfit = OutfitX|NONE|NordRace")], "OutfitX"),
        (
            vec![("A_DISTR.ini", "Outfit = OutfitX"), ("npc.ini", "filterByRaces=NordRace:outfitDefault=OutfitZ")],
            "OutfitZ",
        ),
    ];

    for (sources, expected) in cases {
        let files: Vec<DistributionFile> = sources
            .iter()
            .map(|(name, content)| {
                if name.ends_with("_DISTR.ini") { spid(name, content, &forms) } else { skypatcher(name, content, &forms) }
            })
            .collect();

        let report = run(&files, &[guard("Skyrim.esm|A1")], &forms);
        let winner = report.assignments[0].winner(TargetCategory::Outfit).unwrap();
        assert_eq!(winner.target_label, expected, "{sources:?}");
        assert!(report.assignments[0].has_conflict, "{sources:?}");
    }
}

#[test]
fn conflict_flag_counts_matches_per_category() {
    let forms = forms();
    let files = vec![spid(
        "A_DISTR.ini",
        "Outfit = OutfitX\nKeyword = GuardTag\nKeyword = VeteranTag|NONE|GuardFaction",
        &forms,
    )];

    let report = run(&files, &[guard("Skyrim.esm|A1"), civilian("Skyrim.esm|B1")], &forms);

    // One outfit and two keywords: the keyword category conflicts.
    let g = report.assignment(&key("Skyrim.esm|A1")).unwrap();
    assert!(g.has_conflict);
    assert_eq!(g.final_keyword.as_deref(), Some("VeteranTag"));
    assert_eq!(g.distributions_for(TargetCategory::Outfit).count(), 1);
    assert_eq!(g.distributions_for(TargetCategory::Keyword).count(), 2);
    assert_eq!(g.distributions[0].target.category(), TargetCategory::Outfit);

    // One of each: no conflict.
    let c = report.assignment(&key("Skyrim.esm|B1")).unwrap();
    assert!(!c.has_conflict);
    assert_eq!(c.final_keyword.as_deref(), Some("GuardTag"));
}

#[test]
fn actors_nothing_matches_are_left_out() {
    let forms = forms();
    let files = vec![spid("A_DISTR.ini", "Outfit = OutfitY|NONE|GuardFaction", &forms)];

    let report = run(&files, &[civilian("Skyrim.esm|B1"), guard("Skyrim.esm|A1")], &forms);

    assert_eq!(report.assignments.len(), 1);
    assert_eq!(report.assignments[0].npc, key("Skyrim.esm|A1"));
}

#[test]
fn resolution_is_deterministic() {
    let forms = forms();
    let files = vec![
        spid("A_DISTR.ini", "Outfit = OutfitX\nKeyword = GuardTag|ActorTypeNPC", &forms),
        spid("B_DISTR.ini", "Outfit = OutfitY|NONE|GuardFaction,NordRace|NONE|F", &forms),
        skypatcher("npc.ini", "filterByFactionsExcluded=GuardFaction:keywordsToAdd=CivTag,TownTag", &forms),
    ];
    let mut npcs: Vec<NpcFilterData> = (0..50)
        .map(|i| if i % 3 == 0 { guard(&format!("Skyrim.esm|{:X}", 0x100 + i)) } else { civilian(&format!("Skyrim.esm|{:X}", 0x100 + i)) })
        .collect();
    for (i, npc) in npcs.iter_mut().enumerate() {
        npc.is_female = i % 2 == 0;
        npc.keywords.insert("ActorTypeNPC".into());
    }

    let first = run(&files, &npcs, &forms);
    let second = run(&files, &npcs, &forms);

    assert_eq!(first.assignments, second.assignments);
    assert_eq!(first.stats, second.stats);
    assert_eq!(
        serde_json::to_string(&first.assignments).unwrap(),
        serde_json::to_string(&second.assignments).unwrap()
    );
}

#[test]
fn exclusion_beats_inclusion_in_every_category() {
    let npc = guard("Skyrim.esm|A1");
    let mut npc_kw = npc.clone();
    npc_kw.keywords.insert("ActorTypeNPC".into());

    let base = || DistributionEntry::new(DistributionTarget::Outfit(key("Guards.esp|800")), 1);
    let mut by_npc = base();
    by_npc.npc_filters = vec![FormFilter::include(npc.form_key.clone()), FormFilter::exclude(npc.form_key.clone())];
    let mut by_faction = base();
    by_faction.faction_filters = vec![FormFilter::exclude(key("Skyrim.esm|28848"))];
    by_faction.race_filters = vec![FormFilter::include(key("Skyrim.esm|13746"))];
    let mut by_race = base();
    by_race.race_filters = vec![FormFilter::include(key("Skyrim.esm|13746")), FormFilter::exclude(key("Skyrim.esm|13746"))];
    let mut by_keyword = base();
    by_keyword.keyword_filters = vec![KeywordFilter::exclude("actortypenpc")];

    for entry in [&by_npc, &by_faction, &by_race] {
        assert!(!matches(entry, &npc), "{entry:?}");
    }
    assert!(!matches(&by_keyword, &npc_kw));
}

#[test]
fn global_entries_match_every_actor() {
    let forms = forms();
    let files = vec![spid("A_DISTR.ini", "Outfit = OutfitX", &forms)];
    let npcs: Vec<NpcFilterData> = (1..=20).map(|i| NpcFilterData::new(key(&format!("Skyrim.esm|{i:X}")))).collect();

    let report = run(&files, &npcs, &forms);

    assert_eq!(report.assignments.len(), npcs.len());
    assert!(report.assignments.iter().all(|a| a.distributions[0].targets_all_npcs));
    assert_eq!(report.stats.actor_count(&DistributionTarget::Outfit(key("Guards.esp|800"))), npcs.len());
}

#[test]
fn counts_are_distinct_actors() {
    let forms = forms();
    // Three entries resolving to the same outfit, all matching the guard.
    let files = vec![
        spid("A_DISTR.ini", "Outfit = OutfitX\nOutfit = OutfitX|NONE|GuardFaction", &forms),
        skypatcher("npc.ini", "filterByRaces=NordRace:outfitDefault=OutfitX", &forms),
    ];
    let npcs = vec![guard("Skyrim.esm|A1"), civilian("Skyrim.esm|B1")];

    let report = run(&files, &npcs, &forms);
    let outfit_x = DistributionTarget::Outfit(key("Guards.esp|800"));

    assert_eq!(report.assignment(&key("Skyrim.esm|A1")).unwrap().distributions.len(), 3);
    assert_eq!(report.stats.actor_count(&outfit_x), 2);
    assert!(report.stats.per_target_actor_counts.values().all(|&n| n <= npcs.len()));
}

#[test]
fn keyword_spellings_count_as_one_target() {
    let forms = forms();
    let files = vec![spid("A_DISTR.ini", "Keyword = GuardTag", &forms), spid("B_DISTR.ini", "Keyword = guardtag", &forms)];
    let npcs = vec![guard("Skyrim.esm|A1"), civilian("Skyrim.esm|B1")];

    let report = run(&files, &npcs, &forms);

    assert_eq!(report.stats.per_target_actor_counts.len(), 1);
    assert_eq!(report.stats.actor_count(&DistributionTarget::Keyword("GUARDTAG".into())), 2);
}

#[test]
fn unchanged_targets_compare_against_defaults() {
    let forms = forms();
    let files = vec![
        spid("A_DISTR.ini", "Outfit = OutfitX\nKeyword = ActorTypeNPC\nKeyword = GuardTag|NONE|GuardFaction", &forms),
        spid("B_DISTR.ini", "Outfit = OutfitY|NONE|GuardFaction", &forms),
    ];

    let mut g = guard("Skyrim.esm|A1");
    g.default_outfit = Some(key("Guards.esp|801"));
    let mut c = civilian("Skyrim.esm|B1");
    c.default_outfit = Some(key("Guards.esp|800"));
    c.keywords.insert("ActorTypeNPC".into());

    let report = run(&files, &[g, c], &forms);
    let stats = &report.stats;

    // Every winner already wore these.
    assert!(stats.is_unchanged(&DistributionTarget::Outfit(key("Guards.esp|800"))));
    assert!(stats.is_unchanged(&DistributionTarget::Outfit(key("Guards.esp|801"))));
    // The civilian already carries it; the guard never ends up with it as a winner.
    assert!(stats.is_unchanged(&DistributionTarget::Keyword("ActorTypeNPC".into())));
    assert!(!stats.is_unchanged(&DistributionTarget::Keyword("GuardTag".into())));
    assert_eq!(stats.changed_targets().count(), 1);
}

#[test]
fn aggregate_treats_unknown_actors_as_changed() {
    let forms = forms();
    let files = vec![spid("A_DISTR.ini", "Outfit = OutfitX", &forms)];
    let mut npc = civilian("Skyrim.esm|B1");
    npc.default_outfit = Some(key("Guards.esp|800"));

    let report = run(&files, std::slice::from_ref(&npc), &forms);
    let outfit_x = DistributionTarget::Outfit(key("Guards.esp|800"));

    assert!(aggregate(&report.assignments, std::slice::from_ref(&npc)).is_unchanged(&outfit_x));
    assert!(!aggregate(&report.assignments, &[]).is_unchanged(&outfit_x));
}

#[test]
fn unresolved_entries_stay_out_of_matching() {
    let forms = forms();
    let files = vec![spid("A_DISTR.ini", "Outfit = OutfitX|*Guard\nOutfit = OutfitY|NONE|MissingFaction", &forms)];

    let report = run(&files, &[guard("Skyrim.esm|A1")], &forms);

    assert!(report.assignments.is_empty());
    assert_eq!(report.unresolved.len(), 2);
    assert_eq!(report.unresolved[1].raw_form_filters.as_deref(), Some("MissingFaction"));
}

#[test]
fn empty_inputs_give_an_empty_table() {
    let forms = forms();
    let files = vec![spid("A_DISTR.ini", "Outfit = OutfitX", &forms)];

    assert!(run(&[], &[guard("Skyrim.esm|A1")], &forms).assignments.is_empty());
    assert!(run(&files, &[], &forms).assignments.is_empty());
    assert!(run(&[], &[], &forms).stats.per_target_actor_counts.is_empty());
}

#[test]
fn duplicate_actor_keys_fail_the_pass() {
    let forms = forms();
    let files = vec![spid("A_DISTR.ini", "Outfit = OutfitX", &forms)];
    let npcs = vec![guard("Skyrim.esm|A1"), civilian("skyrim.ESM|a1")];

    let result = resolve_with(&files, &npcs, &Context::new(&forms), &Options::default());
    assert!(matches!(result, Err(Error::DuplicateNpc(k)) if k == key("Skyrim.esm|A1")));
}

#[test]
fn cancellation_between_batches_publishes_nothing() {
    let forms = forms();
    let files = vec![spid("A_DISTR.ini", "Outfit = OutfitX", &forms)];
    let npcs: Vec<NpcFilterData> = (1..=10).map(|i| NpcFilterData::new(key(&format!("Skyrim.esm|{i:X}")))).collect();
    let options = Options { batch_size: 3, ..Options::default() };

    let token = CancellationToken::new();
    let ctx = Context::new(&forms).with_cancel(&token);
    let report = resolve_with(&files, &npcs, &ctx, &options).unwrap();
    assert_eq!(report.metrics.batches, 4);

    token.cancel();
    assert!(matches!(resolve_with(&files, &npcs, &ctx, &options), Err(Error::Cancelled)));
}
