//! Bidsman CLI application entry point
//!
//! # Usage
//!
//! ```bash
//! # Preview a rename that adds a run entity to every matching file
//! bidsman --dry-run rename --root /data/ds --file "*task-rest*" --set-entity run=1
//!
//! # Import staged events files next to their bold runs
//! bidsman import --source /incoming --root /data/ds --events
//!
//! # Set RepetitionTime in every functional sidecar
//! bidsman json --root /data/ds --modality func add --field RepetitionTime --value 2.0
//!
//! # Clean gzip headers under func/
//! bidsman scrub --root /data/ds
//! ```

use colored::Colorize;
use dialoguer::Confirm;
use glob::Pattern;

use bidsman::{
    BidsmanError,
    cli::{
        Cli, Commands, ImportArgs, JsonArgs, JsonCommands, RenameArgs, ScrubArgs,
        parse_entity_assignment, parse_replace_spec,
    },
    config::{DatasetFilter, RunConfig},
    import::{self, ImportOptions},
    mover,
    output::{OpSummary, Reporter},
    rename::{self, RenameRequest},
    scrub, sidecar,
};

type Result<T> = std::result::Result<T, BidsmanError>;

fn main() {
    let cli = Cli::parse_args();
    let config = RunConfig::new(cli.verbose, cli.dry_run);

    let outcome = match cli.command {
        Commands::Rename(args) => run_rename(&args, config),
        Commands::Import(args) => run_import(&args, config),
        Commands::Json(args) => run_json(&args, config),
        Commands::Scrub(args) => run_scrub(&args, config),
    };

    if let Err(err) = outcome {
        eprintln!("{} {err}", "Error:".red().bold());
        std::process::exit(1);
    }
}

fn run_rename(args: &RenameArgs, config: RunConfig) -> Result<()> {
    let request = RenameRequest {
        remove_substrings: args.remove_substrings.clone(),
        replacements: args
            .replacements
            .iter()
            .map(|raw| parse_replace_spec(raw))
            .collect::<Result<Vec<_>>>()?,
        remove_entities: args.remove_entities.clone(),
        set_entities: args
            .set_entities
            .iter()
            .map(|raw| parse_entity_assignment(raw))
            .collect::<Result<Vec<_>>>()?,
    };
    if request.is_empty() {
        return Err(BidsmanError::InvalidInput(
            "No transformations requested; nothing to do".to_string(),
        ));
    }
    request.validate()?;

    let filter = DatasetFilter::new(
        args.filter.session.clone(),
        args.filter.modality,
        args.filter.filename.as_deref(),
    )?;

    if !args.root.is_dir() {
        return Err(BidsmanError::InvalidInput(format!(
            "Directory not found: {}",
            args.root.display()
        )));
    }

    let reporter = Reporter::new(config.verbose, config.dry_run);
    let mut summary = OpSummary::new();
    let moves = rename::plan_renames(&args.root, &request, &filter, &reporter, &mut summary);
    mover::verify_batch(&args.root, &moves)?;

    if !moves.is_empty() && !config.dry_run && !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Rename {} file(s)?", moves.len()))
            .interact()
            .map_err(|e| BidsmanError::InvalidInput(format!("Failed to get confirmation: {e}")))?;
        if !confirmed {
            println!("Operation cancelled.");
            return Ok(());
        }
    }

    mover::execute_batch(&args.root, &moves, !args.no_backup, &reporter, &mut summary);
    summary.print("Rename", config.dry_run);
    Ok(())
}

fn run_import(args: &ImportArgs, config: RunConfig) -> Result<()> {
    let options = ImportOptions {
        include_events: args.events || !args.physio,
        include_physio: args.physio,
        pattern: args.pattern.as_deref().map(Pattern::new).transpose()?,
        session: args.session.clone(),
        subject: args.subject.clone(),
        min_event_lines: args.min_lines,
        overwrite: args.overwrite,
    };

    let summary = import::import_tree(&args.source, &args.root, &options, config)?;
    summary.print("Import", config.dry_run);
    Ok(())
}

fn run_json(args: &JsonArgs, config: RunConfig) -> Result<()> {
    let filter = DatasetFilter::new(
        args.filter.session.clone(),
        args.filter.modality,
        args.filter.filename.as_deref(),
    )?;
    let options = sidecar::SidecarOptions {
        pattern: Pattern::new(&args.pattern)?,
        backup: !args.no_backup,
    };

    let op = match &args.command {
        JsonCommands::Add {
            field,
            value,
            overwrite,
        } => sidecar::SidecarOp::Add {
            field: field.clone(),
            value: value.clone(),
            overwrite: *overwrite,
        },
        JsonCommands::Remove { field } => sidecar::SidecarOp::Remove {
            field: field.clone(),
        },
        JsonCommands::Modify {
            field,
            value,
            create,
        } => sidecar::SidecarOp::Modify {
            field: field.clone(),
            value: value.clone(),
            create: *create,
        },
        JsonCommands::Replace {
            field,
            search,
            replace,
        } => sidecar::SidecarOp::ReplaceString {
            field: field.clone(),
            search: search.clone(),
            replace: replace.clone(),
        },
        JsonCommands::List => {
            let fields = sidecar::list_fields(&args.root, &filter, &options, config)?;
            println!("Found {} unique fields:", fields.len());
            for field in fields {
                println!("  - {field}");
            }
            return Ok(());
        }
        JsonCommands::Validate => {
            let summary = sidecar::validate_sidecars(&args.root, &filter, &options, config)?;
            summary.print("Validate", config.dry_run);
            return Ok(());
        }
    };

    let summary = sidecar::edit_sidecars(&args.root, &op, &filter, &options, config)?;
    summary.print("Json Edit", config.dry_run);
    Ok(())
}

fn run_scrub(args: &ScrubArgs, config: RunConfig) -> Result<()> {
    let filter = DatasetFilter::new(None, Some(args.modality), None)?;
    let summary = scrub::scrub_tree(&args.root, &filter, config)?;
    summary.print("Scrub", config.dry_run);
    Ok(())
}
