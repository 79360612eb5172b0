//! End-to-end pipeline scenarios through the public matcher API, using the
//! in-memory collaborator fakes.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use ripmatch_core::{EpisodeMatcher, MatchPolicy, RipSpec, StrategyKind};
use test_utils::{
    episode_script, rip_script, season_fixture, FakeTranscriber, MemoryReferenceCache,
    PlainNormalizer, StaticReferenceSource, StaticSeasonCatalog, VerdictLlm,
};

/// Opt-in log capture: `RUST_LOG=ripmatch_core=debug cargo test`
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Rip spec with `rip_count` unresolved episodes and ripped assets
fn spec(rip_count: usize, disc_number: Option<u32>) -> RipSpec {
    let mut spec = RipSpec::default();
    spec.metadata.show_title = "Example Show".to_string();
    spec.metadata.season_number = 1;
    spec.metadata.tmdb_id = Some(42);
    spec.attributes.disc_number = disc_number;
    for i in 0..rip_count {
        let key = format!("s01e{:02}", i + 1);
        spec.episodes.push(ripmatch_core::ripspec::RipSpecEpisode {
            key: key.clone(),
            title_id: 800 + i as u32,
            ..Default::default()
        });
        spec.titles.push(ripmatch_core::ripspec::TitleRecord {
            title_id: 800 + i as u32,
            name: format!("Play {i}"),
            ..Default::default()
        });
        spec.assets
            .ripped
            .insert(key, format!("/discs/title{i}.mkv").into());
    }
    spec
}

/// Matcher whose rip `i` (disc order) transcribes to `content_episodes[i]`
fn matcher_for(
    content_episodes: &[u32],
    season_len: u32,
    noise: usize,
) -> EpisodeMatcher {
    let mut transcriber = FakeTranscriber::new();
    for (i, &episode) in content_episodes.iter().enumerate() {
        transcriber = transcriber.with_script(
            &format!("s01e{:02}", i + 1),
            &rip_script(episode, noise),
        );
    }
    let mut source = StaticReferenceSource::new();
    for e in 1..=season_len {
        source = source.with_episode_text(e, &episode_script(e));
    }
    EpisodeMatcher::new(
        Arc::new(transcriber),
        Arc::new(StaticSeasonCatalog::new(season_fixture(season_len))),
        Arc::new(source),
        Arc::new(MemoryReferenceCache::new()),
        Arc::new(PlainNormalizer),
        MatchPolicy::default(),
    )
}

fn targets_by_key(spec: &RipSpec) -> Vec<(String, u32)> {
    spec.episodes
        .iter()
        .map(|e| (e.key.clone(), e.episode))
        .collect()
}

// Scenario: ordered disc 1 with clean transcripts
#[tokio::test]
async fn ordered_disc_matches_the_diagonal() {
    init_tracing();
    let matcher = matcher_for(&[1, 2, 3, 4], 10, 4);
    let mut spec = spec(4, Some(1));
    let work = tempfile::tempdir().unwrap();

    let outcome = matcher
        .match_disc(&mut spec, work.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.applied);
    assert!(!outcome.needs_review);
    assert_eq!(outcome.matches.len(), 4);
    assert_eq!(
        targets_by_key(&spec),
        vec![
            ("s01e01".to_string(), 1),
            ("s01e02".to_string(), 2),
            ("s01e03".to_string(), 3),
            ("s01e04".to_string(), 4),
        ]
    );

    let first = &spec.episodes[0];
    assert_eq!(first.season, 1);
    assert_eq!(first.episode_title.as_deref(), Some("Episode 1"));
    assert_eq!(first.output_basename.as_deref(), Some("Example Show - s01e01"));
    assert!(first.match_confidence.unwrap() > 0.7);

    let title = &spec.titles[0];
    assert_eq!(title.episode, Some(1));
    assert_eq!(title.season, Some(1));

    let attributes = &spec.attributes;
    assert_eq!(
        attributes.content_id_method.as_deref(),
        Some("transcript_reference")
    );
    assert!(attributes.episodes_synchronized);
    assert!(!attributes.needs_review);
    assert_eq!(attributes.content_id_matches.len(), 4);
    assert!(attributes.content_id_transcripts.contains_key("s01e01"));
    assert!(attributes.content_id_selected_strategy.is_some());
    assert!(!attributes.content_id_strategy_scores.is_empty());
}

// Scenario: files named in disc order but physically out of sequence
#[tokio::test]
async fn swapped_titles_recover_the_true_permutation() {
    let matcher = matcher_for(&[2, 1, 4, 3], 10, 4);
    let mut spec = spec(4, Some(1));
    let work = tempfile::tempdir().unwrap();

    let outcome = matcher
        .match_disc(&mut spec, work.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.applied);
    assert_eq!(
        targets_by_key(&spec),
        vec![
            ("s01e01".to_string(), 2),
            ("s01e02".to_string(), 1),
            ("s01e03".to_string(), 4),
            ("s01e04".to_string(), 3),
        ]
    );
    let mean: f64 = outcome.matches.iter().map(|m| m.score).sum::<f64>()
        / outcome.matches.len() as f64;
    assert!(mean >= 0.58);
}

// Scenario: anchor recovery away from the disc-block estimate
#[tokio::test]
async fn anchor_window_wins_the_strategy_tie() {
    // Disc 2 of 12, but the content actually sits at episodes 8..=11;
    // the disc-block estimate would look at 3..=10
    let matcher = matcher_for(&[8, 9, 10, 11], 12, 4);
    let mut spec = spec(4, Some(2));
    let work = tempfile::tempdir().unwrap();

    let outcome = matcher
        .match_disc(&mut spec, work.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.applied);
    assert_eq!(outcome.selected_strategy, Some(StrategyKind::AnchorWindow));
    assert_eq!(
        targets_by_key(&spec),
        vec![
            ("s01e01".to_string(), 8),
            ("s01e02".to_string(), 9),
            ("s01e03".to_string(), 10),
            ("s01e04".to_string(), 11),
        ]
    );
    // The full-season sweep found the same matches but lost the order tie
    assert!(outcome
        .strategy_scores
        .iter()
        .any(|s| s.strategy == StrategyKind::FullSeason && s.matches == 4));
}

// Scenario: LLM cross-match rewires a noisy disc
#[tokio::test]
async fn llm_cross_match_reassigns_rejected_rips() {
    // Noisy transcripts: cosine still lands the diagonal but under the
    // verification threshold
    let llm = VerdictLlm::new()
        .with_verdict("s01e01", 1, false, 0.1)
        .with_verdict("s01e02", 2, false, 0.1)
        .with_verdict("s01e03", 3, false, 0.1)
        .with_verdict("s01e01", 2, true, 0.9)
        .with_verdict("s01e02", 3, true, 0.88)
        .with_verdict("s01e03", 1, true, 0.85);

    let mut transcriber = FakeTranscriber::new();
    for (i, &episode) in [1_u32, 2, 3].iter().enumerate() {
        transcriber = transcriber.with_script(
            &format!("s01e{:02}", i + 1),
            &rip_script(episode, 17),
        );
    }
    let mut source = StaticReferenceSource::new();
    for e in 1..=3 {
        source = source.with_episode_text(e, &episode_script(e));
    }
    let matcher = EpisodeMatcher::new(
        Arc::new(transcriber),
        Arc::new(StaticSeasonCatalog::new(season_fixture(3))),
        Arc::new(source),
        Arc::new(MemoryReferenceCache::new()),
        Arc::new(PlainNormalizer),
        MatchPolicy::default(),
    )
    .with_llm(Arc::new(llm));

    let mut spec = spec(3, Some(1));
    let work = tempfile::tempdir().unwrap();

    let outcome = matcher
        .match_disc(&mut spec, work.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.applied);
    assert!(!outcome.needs_review, "{:?}", outcome.review_reasons);
    assert_eq!(
        targets_by_key(&spec),
        vec![
            ("s01e01".to_string(), 2),
            ("s01e02".to_string(), 3),
            ("s01e03".to_string(), 1),
        ]
    );
    // Scores come from the LLM confidences
    let confidence = |key: &str| {
        spec.episodes
            .iter()
            .find(|e| e.key == key)
            .and_then(|e| e.match_confidence)
            .unwrap()
    };
    assert!((confidence("s01e01") - 0.9).abs() < 1e-9);
    assert!((confidence("s01e02") - 0.88).abs() < 1e-9);
    assert!((confidence("s01e03") - 0.85).abs() < 1e-9);
}

// Scenario: disc 1 hard rule with content shifted off episode 1
#[tokio::test]
async fn disc1_rule_flags_a_shifted_disc() {
    init_tracing();
    let content: Vec<u32> = (2..=13).collect();
    let matcher = matcher_for(&content, 13, 4);
    let mut spec = spec(12, Some(1));
    let work = tempfile::tempdir().unwrap();

    let outcome = matcher
        .match_disc(&mut spec, work.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.applied);
    assert!(outcome.needs_review);
    assert!(spec
        .attributes
        .review_reason
        .contains("disc 1 anchor outside valid high-confidence range"));
    // The emitted block is [1, 12]; every surviving target sits inside it
    for m in &outcome.matches {
        assert!((1..=12).contains(&m.target_episode));
    }
}

// Boundary: single rip, single-episode season
#[tokio::test]
async fn single_rip_single_reference_matches() {
    let matcher = matcher_for(&[1], 1, 4);
    let mut spec = spec(1, Some(1));
    let work = tempfile::tempdir().unwrap();

    let outcome = matcher
        .match_disc(&mut spec, work.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.applied);
    assert_eq!(outcome.matches.len(), 1);
    assert_eq!(spec.episodes[0].episode, 1);
}

// Boundary: resolved rip-spec episodes seed the plan and survive matching
#[tokio::test]
async fn resolved_episodes_are_respected() {
    let matcher = matcher_for(&[5, 6, 7], 12, 4);
    let mut spec = spec(3, Some(2));
    for (i, episode) in [5_u32, 6, 7].iter().enumerate() {
        spec.episodes[i].episode = *episode;
        spec.episodes[i].season = 1;
    }
    let work = tempfile::tempdir().unwrap();

    let outcome = matcher
        .match_disc(&mut spec, work.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.applied);
    assert_eq!(
        targets_by_key(&spec),
        vec![
            ("s01e01".to_string(), 5),
            ("s01e02".to_string(), 6),
            ("s01e03".to_string(), 7),
        ]
    );
}

// Determinism: identical inputs give identical outcomes and telemetry
#[tokio::test]
async fn matching_is_deterministic() {
    let work = tempfile::tempdir().unwrap();

    let mut first_targets = None;
    let mut first_scores = None;
    for _ in 0..2 {
        let matcher = matcher_for(&[8, 9, 10, 11], 12, 6);
        let mut spec = spec(4, Some(2));
        let outcome = matcher
            .match_disc(&mut spec, work.path(), &CancellationToken::new())
            .await
            .unwrap();

        let targets = targets_by_key(&spec);
        let scores: Vec<String> = outcome
            .strategy_scores
            .iter()
            .map(|s| format!("{:?}:{}:{:.12}", s.strategy, s.matches, s.average_score))
            .collect();
        match (&first_targets, &first_scores) {
            (None, None) => {
                first_targets = Some(targets);
                first_scores = Some(scores);
                assert_eq!(outcome.selected_strategy, Some(StrategyKind::AnchorWindow));
            }
            (Some(t), Some(s)) => {
                assert_eq!(&targets, t);
                assert_eq!(&scores, s);
            }
            _ => unreachable!(),
        }
    }
}
