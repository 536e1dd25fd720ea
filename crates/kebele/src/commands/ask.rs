//! Ask command - one-shot question to the guide.

use anyhow::Result;
use clap::Args;
use console::Style;
use kebele_ai::{CallContext, ChatSource};

use super::{Context, build_guide, build_llm, build_translator, cancel_on_ctrl_c, load_config};

/// Arguments for the ask command.
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    #[arg(required = true)]
    pub query: String,

    /// User id the exchange is recorded under
    #[arg(short, long, default_value = "cli")]
    pub user: String,

    /// Translate the answer into this language code
    #[arg(short, long)]
    pub lang: Option<String>,
}

/// Run the ask command.
pub async fn run(args: AskArgs, ctx: &Context) -> Result<()> {
    let config = load_config(ctx)?;
    let llm = build_llm(&config)?;
    let guide = build_guide(&config, llm.clone()).await?;

    let call = CallContext::new();
    cancel_on_ctrl_c(&call);

    let outcome = guide.answer_detailed(&call, &args.user, &args.query).await?;

    let mut document = serde_json::to_value(&outcome)?;
    if let Some(ref lang) = args.lang {
        let translator = build_translator(&config, llm);
        document = translator.translate_document(&call, &document, lang).await?;
    }

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let answer = document["answer"].as_str().unwrap_or(&outcome.answer);
    println!("{}", answer);
    println!();

    let source = match outcome.source {
        ChatSource::Official => Style::new().green().apply_to("official"),
        ChatSource::Unofficial => Style::new().yellow().apply_to("unofficial"),
    };
    println!("{} {}", dim.apply_to("Source:"), source);
    for procedure in &outcome.related {
        println!("{} {}", dim.apply_to("  -"), procedure.name);
    }
    if ctx.verbose {
        println!("{} {}", dim.apply_to("Language:"), outcome.language);
    }
    if let Some(ref warning) = outcome.persistence_warning {
        eprintln!("{} {}", Style::new().yellow().apply_to("warning:"), warning);
    }

    Ok(())
}
