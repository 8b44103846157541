use clap::Parser;
use declmap::cli::{Cli, Commands, MergeArgs, PruneArgs, ResolveArgs};
use declmap::core::ConflictPolicy;

#[test]
fn resolve_defaults_and_policy_override() {
    // Given
    let argv = vec![
        "declmap",
        "resolve",
        "inventory.json",
        "implement_map.json",
        "--conflict-policy",
        "first-wins",
    ];

    // When
    let cmd = Cli::parse_from(argv);

    // Then
    match cmd.command {
        Commands::Resolve(ResolveArgs { src_root, output, conflict_policy, .. }) => {
            assert_eq!(src_root.to_string_lossy(), ".");
            assert_eq!(output.to_string_lossy(), "declmap.json");
            assert_eq!(conflict_policy, Some(ConflictPolicy::FirstWins));
        }
        _ => panic!("expected Resolve command"),
    }
}

#[test]
fn merge_takes_three_inputs_and_optional_errors() {
    let cmd = Cli::parse_from([
        "declmap",
        "--quiet",
        "merge",
        "taint.yml",
        "deps.json",
        "declmap.json",
        "--errors",
        "errors.json",
        "--attribute",
        "Taint",
    ]);

    assert!(cmd.quiet);
    match cmd.command {
        Commands::Merge(MergeArgs { taint, graph, declmap, output, errors, attribute }) => {
            assert!(taint.ends_with("taint.yml"));
            assert!(graph.ends_with("deps.json"));
            assert!(declmap.ends_with("declmap.json"));
            assert_eq!(output.to_string_lossy(), "merged.json");
            assert_eq!(errors.expect("errors path").to_string_lossy(), "errors.json");
            assert_eq!(attribute.as_deref(), Some("Taint"));
        }
        _ => panic!("expected Merge command"),
    }
}

#[test]
fn global_flags_after_subcommand() {
    let cmd = Cli::parse_from(["declmap", "prune", "deps.json", "--threshold", "2.5", "--dry-run", "--no-color"]);

    assert!(cmd.dry_run);
    assert!(cmd.no_color);
    match cmd.command {
        Commands::Prune(PruneArgs { threshold, .. }) => assert_eq!(threshold, Some(2.5)),
        _ => panic!("expected Prune command"),
    }
}

#[test]
fn merge_requires_declmap_argument() {
    let result = Cli::try_parse_from(["declmap", "merge", "taint.yml", "deps.json"]);
    assert!(result.is_err());
}

#[test]
fn unknown_conflict_policy_is_rejected() {
    let result = Cli::try_parse_from([
        "declmap",
        "resolve",
        "inventory.json",
        "implement_map.json",
        "--conflict-policy",
        "newest",
    ]);
    assert!(result.is_err());
}
