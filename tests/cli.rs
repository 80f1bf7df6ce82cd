use clap::Parser;
use fragforge::cli::{Cli, Commands, FolderSubcommand};

#[test]
fn parametrize_flags_parse()
{
    // Given
    let argv = vec![
        "frag",
        "parametrize",
        "demo.py:5",
        "--no-probe",
        "--timeout-ms",
        "250",
        "--json",
        "--store",
        "/tmp/s.json",
    ];

    // When
    let cli = Cli::parse_from(argv);

    // Then
    assert!(cli.store.is_some());
    match cli.command
    {
        Commands::Parametrize(args) =>
        {
            assert_eq!(args.target, "demo.py:5");
            assert!(args.probe.no_probe);
            assert_eq!(args.probe.timeout_ms, Some(250));
            assert!(args.json);
        }
        _ => panic!("expected Parametrize command"),
    }
}

#[test]
fn add_parametrize_requires_from()
{
    let res = Cli::try_parse_from(["frag", "add", "loop", "--parametrize"]);

    assert!(res.is_err());
}

#[test]
fn folder_set_children_collects_labels()
{
    let cli = Cli::parse_from(["frag", "folder", "set-children", "loops", "a", "b"]);

    match cli.command
    {
        Commands::Folder(args) => match args.command
        {
            FolderSubcommand::SetChildren { label, children } =>
            {
                assert_eq!(label, "loops");
                assert_eq!(children, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected folder command: {other:?}"),
        },
        _ => panic!("expected Folder command"),
    }
}
