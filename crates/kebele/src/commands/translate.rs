//! Translate command - translate a JSON document from disk.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use kebele_ai::CallContext;
use serde_json::Value;

use super::{Context, build_llm, build_translator, cancel_on_ctrl_c, load_config};

/// Arguments for the translate command.
#[derive(Args, Debug)]
pub struct TranslateArgs {
    /// JSON file to translate ("-" for stdin)
    #[arg(required = true)]
    pub file: PathBuf,

    /// Target language code
    #[arg(short, long)]
    pub lang: String,
}

/// Run the translate command.
pub async fn run(args: TranslateArgs, ctx: &Context) -> Result<()> {
    let config = load_config(ctx)?;

    let raw = if args.file.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("reading stdin")?
    } else {
        std::fs::read_to_string(&args.file)
            .with_context(|| format!("reading {}", args.file.display()))?
    };
    let document: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", args.file.display()))?;

    let translator = build_translator(&config, build_llm(&config)?);
    if ctx.verbose {
        eprintln!(
            "Translating {} unit(s) into {}",
            translator.translatable_units(&document).len(),
            args.lang
        );
    }

    let call = CallContext::new();
    cancel_on_ctrl_c(&call);

    let translated = translator
        .translate_document(&call, &document, &args.lang)
        .await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string(&translated)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&translated)?);
    }
    Ok(())
}
