use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use studio_core::edit::{EditMode, ToneStyle};
use studio_core::refine::Skill;
use studio_harness::Harness;
use studio_harness::vendors::anthropic::{
    AVAILABLE_MODELS, AnthropicProvider, DEFAULT_MODEL, resolve_model,
};

mod board;
mod chat;
mod config;
mod edit;
mod refine;

#[derive(Parser, Debug)]
#[command(name = "studio", version, about = "Chat, edit and plan from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat with the model; artifacts replace the working document.
    ///
    /// Without a prompt, starts an interactive session. Type /help there.
    Chat {
        /// One-shot prompt.
        prompt: Option<String>,
        /// Model id (defaults to STUDIO_MODEL, then the catalog default).
        #[arg(long, short)]
        model: Option<String>,
        #[arg(long, default_value_t = studio_harness::model::DEFAULT_MAX_TOKENS)]
        max_tokens: u32,
        /// Write each artifact to `<dir>/<identifier>.<ext>`.
        #[arg(long)]
        save_dir: Option<PathBuf>,
    },
    /// Apply an AI edit to a document file.
    Edit(EditArgs),
    /// Revise a whole document, guided by expert skills.
    Refine(RefineArgs),
    /// Manage the kanban board.
    Board {
        /// Board file (defaults to STUDIO_BOARD_PATH, then .studio/board.json).
        #[arg(long)]
        store: Option<PathBuf>,
        #[command(subcommand)]
        command: board::BoardCommand,
    },
    /// List the selectable models.
    Models,
}

#[derive(clap::Args, Debug)]
struct EditArgs {
    /// improve_selection, rewrite_selection, summarize_selection,
    /// expand_selection, fix_grammar, rewrite_document or explain_selection.
    #[arg(long)]
    mode: EditMode,
    /// Document to edit.
    #[arg(long, short)]
    document: PathBuf,
    /// Text to operate on; its first occurrence in the document is used.
    #[arg(long, short)]
    selection: Option<String>,
    /// Extra instructions for the edit.
    #[arg(long, short)]
    instructions: Option<String>,
    /// Tone for rewrite_selection.
    #[arg(long, default_value = "professional")]
    tone: ToneStyle,
    #[arg(long, short)]
    model: Option<String>,
    /// Write the result back to the document instead of printing it.
    #[arg(long)]
    in_place: bool,
}

#[derive(clap::Args, Debug)]
struct RefineArgs {
    #[arg(long, short)]
    document: PathBuf,
    /// What to change.
    #[arg(long, short)]
    instruction: String,
    /// grammar, style, conciseness, technical or creative. Repeatable.
    #[arg(long = "skill")]
    skills: Vec<Skill>,
    /// Text to focus on; the whole document is still returned.
    #[arg(long, short)]
    selection: Option<String>,
    #[arg(long, short)]
    model: Option<String>,
    #[arg(long)]
    in_place: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init();
    studio_core::init_observability();
    let app = config::AppConfig::from_env();
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            prompt,
            model,
            max_tokens,
            save_dir,
        } => {
            let harness = harness()?;
            let options = chat::ChatOptions {
                model: resolve_model(app.model_or(model.as_deref())),
                max_tokens,
                save_dir,
            };
            chat::run(&harness, options, prompt).await
        }
        Commands::Edit(args) => {
            let harness = harness()?;
            let model = resolve_model(app.model_or(args.model.as_deref()));
            let request = edit::EditCommand {
                mode: args.mode,
                document: args.document,
                selection: args.selection,
                instructions: args.instructions,
                tone: args.tone,
                in_place: args.in_place,
            };
            edit::run(&harness, model, request).await
        }
        Commands::Refine(args) => {
            let harness = harness()?;
            let model = resolve_model(app.model_or(args.model.as_deref()));
            let request = refine::RefineCommand {
                document: args.document,
                instruction: args.instruction,
                selection: args.selection,
                skills: args.skills,
                in_place: args.in_place,
            };
            refine::run(&harness, model, request).await
        }
        Commands::Board { store, command } => {
            let path = store.unwrap_or(app.board_path);
            board::run(&path, command)
        }
        Commands::Models => {
            print!("{}", model_listing());
            Ok(())
        }
    }
}

fn model_listing() -> String {
    let mut out = String::new();
    for info in AVAILABLE_MODELS {
        let marker = if info.id == DEFAULT_MODEL { "*" } else { " " };
        let _ = writeln!(
            out,
            "{marker} {:<28} {:<24} {:<10} {}",
            info.id,
            info.label,
            info.cost_tier.label(),
            info.description
        );
    }
    out
}

fn harness() -> anyhow::Result<Harness> {
    let provider = AnthropicProvider::from_env().context("Anthropic provider is not configured")?;
    Ok(Harness::builder()
        .register_provider(Arc::new(provider))
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_listing_shows_cost_tiers_and_default() {
        let listing = model_listing();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), AVAILABLE_MODELS.len());
        let default_line = lines.iter().find(|l| l.starts_with('*')).unwrap();
        assert!(default_line.contains(DEFAULT_MODEL));
        assert!(default_line.contains(" cheap "));
        assert!(listing.contains(" expensive "));
    }

    #[test]
    fn refine_accepts_repeated_skills() {
        let cli = Cli::try_parse_from([
            "studio", "refine", "-d", "notes.md", "-i", "tighten", "--skill", "grammar", "--skill",
            "conciseness",
        ])
        .unwrap();
        let Commands::Refine(args) = cli.command else {
            panic!("expected refine");
        };
        assert_eq!(args.skills, vec![Skill::Grammar, Skill::Conciseness]);
        assert!(Cli::try_parse_from(["studio", "refine", "-d", "a", "-i", "b", "--skill", "tone"]).is_err());
    }
}
