// SPDX-License-Identifier: MIT
//
// conch: demo console for the conch toolkit.
//
// Each subcommand drives one widget against the real terminal:
//
//   conch rich       → markup rendering and the theme shortcuts
//   conch overwrite  → a status line rewritten in place
//   conch progress   → a progress bar in one of the built-in layouts
//   conch menu       → a radio or checkbox menu on the keyboard loop
//   conch keys       → echo decoded key events until Esc or `q`
//
// Logging goes to stderr and is off unless CONCH_LOG is set
// (e.g. CONCH_LOG=debug), since stderr shares the screen with the widgets.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use conch_term::{Key, Keyboard, KeyboardConfig, Listener, Output, StdinTerminal, StopReason};
use conch_widgets::{Format, Menu, Overwrite, Progress, RichText};

const DEMO_MARKUP: &str = "\
<info>info</info> <comment>comment</comment> <notice>notice</notice> \
<warn>warn</warn> <error>error</error> <question>question</question>
<text color=\"red\" background=\"white\" bold>red on white, <text bold=\"0\" underline>\
then underlined</text></text> &lt;escaped&gt;
";

// ─── Command line ───────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "conch", version, about = "Terminal console toolkit demo")]
struct Cli {
    /// When to emit ANSI escapes.
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto, global = true)]
    color: ColorChoice,

    /// Suppress all output.
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    const fn colorful(self) -> Option<bool> {
        match self {
            Self::Auto => None,
            Self::Always => Some(true),
            Self::Never => Some(false),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render markup; reads the demo text when none is given.
    Rich {
        markup: Option<String>,
    },
    /// Count up on a line that rewrites itself.
    Overwrite {
        #[arg(long, default_value_t = 10)]
        steps: u32,
        #[arg(long, default_value_t = 200)]
        delay_ms: u64,
    },
    /// Run a progress bar to completion.
    Progress {
        /// mini, normal, verbose, or debug.
        #[arg(long, default_value = "normal")]
        format: String,
        #[arg(long, default_value_t = 50)]
        total: u64,
        #[arg(long, default_value_t = 40)]
        delay_ms: u64,
        #[arg(long)]
        title: Option<String>,
        /// Erase the bar when done.
        #[arg(long)]
        clear: bool,
    },
    /// Pick from a menu.
    Menu {
        /// Allow several selections.
        #[arg(long)]
        checkbox: bool,
        /// Wrap long options to the terminal width.
        #[arg(long)]
        fullwidth: bool,
        #[arg(long, default_value = "Pick one")]
        question: String,
        #[arg(default_values_t = ["red".to_owned(), "green".to_owned(), "blue".to_owned()])]
        options: Vec<String>,
    },
    /// Echo key events until Esc or `q`.
    Keys {
        /// Seconds between heartbeat dots; 0 disables them.
        #[arg(long, default_value_t = 3.0)]
        heartbeat: f64,
    },
}

// ─── Logging ────────────────────────────────────────────────────────────────

fn init_logging() {
    let Ok(filter) = EnvFilter::try_from_env("CONCH_LOG") else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ─── Subcommands ────────────────────────────────────────────────────────────

fn rich(output: &Output, markup: Option<&str>) -> Result<()> {
    let mut rich = RichText::new(output.clone());
    rich.write(markup.unwrap_or(DEMO_MARKUP), false)
        .context("rendering markup")?;
    if markup.is_none() {
        rich.line("", 1)?;
        rich.info("info shortcut", 1)?;
        rich.comment("comment shortcut", 1)?;
        rich.notice("notice shortcut", 1)?;
        rich.warn("warn shortcut", 1)?;
        rich.error("error shortcut", 1)?;
    }
    Ok(())
}

fn overwrite(output: &Output, steps: u32, delay: Duration) -> Result<()> {
    let mut line = Overwrite::new(output.clone());
    line.start("<comment>step</comment> %step%%/{steps}%%<info> ({state})</info>%");
    line.set("steps", steps.to_string())?;
    for step in 1..=steps {
        line.set("step", step.to_string())?;
        thread::sleep(delay);
    }
    line.set("state", "done")?;
    Ok(())
}

fn progress(
    output: &Output,
    format: &str,
    total: u64,
    delay: Duration,
    title: Option<&str>,
    clear: bool,
) -> Result<()> {
    let format: Format = format.parse()?;
    let mut bar = Progress::new(output.clone());
    bar.set_total(total)?;
    bar.set_title(title)?;
    bar.start(format)?;
    for current in 1..total {
        thread::sleep(delay);
        bar.update(current)?;
    }
    bar.finish(true, clear)?;
    Ok(())
}

fn menu(
    output: &Output,
    checkbox: bool,
    fullwidth: bool,
    question: &str,
    options: &[String],
) -> Result<()> {
    let mut menu = Menu::new(output.clone());
    menu.set_fullwidth(fullwidth);
    let question = format!("<question>{}</question>", conch_style::escape(question));

    let picked = if checkbox {
        menu.choice(StdinTerminal::new(), Some(question.as_str()), options, &[])?
    } else {
        vec![menu.radio(StdinTerminal::new(), Some(question.as_str()), options, None)?]
    };
    let picked: Vec<&str> = picked
        .into_iter()
        .filter_map(|i| options.get(i).map(String::as_str))
        .collect();
    menu.clear(true, false)?;
    RichText::new(output.clone()).info(&picked.join(", "), 1)?;
    Ok(())
}

fn keys(output: &Output, heartbeat: f64) -> Result<()> {
    let config = KeyboardConfig {
        input_with_invisible: true,
        ..KeyboardConfig::default()
    }
    .with_heartbeat_secs(heartbeat);
    let mut keyboard = Keyboard::with_config(StdinTerminal::new(), config);
    keyboard.attach_output(output.clone());

    let out = output.clone();
    keyboard.on_start(move |_| {
        out.stdout("press keys; Esc or q quits\n")?;
        Ok(())
    });

    let out = output.clone();
    keyboard.on_heartbeat(move |_| {
        out.stdout(".")?;
        Ok(())
    });

    let out = output.clone();
    keyboard.on_input(Listener::new(move |event, _| {
        out.stdout(&format!("{:<10} {:?}\n", event.key.to_string(), event.visible))?;
        Ok(())
    }));

    let quit = Listener::new(|_, control| {
        control.stop();
        Ok(())
    });
    keyboard.on_hotkey([Key::Esc, Key::from('q')], &quit);

    keyboard.on_stop(|reason| match reason {
        StopReason::Interrupted => debug!("keys: interrupted"),
        StopReason::Stopped => debug!("keys: stopped"),
        StopReason::Failed(e) => debug!(error = %e, "keys: failed"),
    });

    keyboard.listen()?;
    Ok(())
}

// ─── Entry point ────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let output = Output::stdio();
    output.set_colorful(cli.color.colorful());
    output.set_quiet(cli.quiet);
    debug!(command = ?cli.command, "starting");

    match &cli.command {
        Command::Rich { markup } => rich(&output, markup.as_deref()),
        Command::Overwrite { steps, delay_ms } => {
            overwrite(&output, *steps, Duration::from_millis(*delay_ms))
        }
        Command::Progress {
            format,
            total,
            delay_ms,
            title,
            clear,
        } => progress(
            &output,
            format,
            *total,
            Duration::from_millis(*delay_ms),
            title.as_deref(),
            *clear,
        ),
        Command::Menu {
            checkbox,
            fullwidth,
            question,
            options,
        } => menu(&output, *checkbox, *fullwidth, question, options),
        Command::Keys { heartbeat } => keys(&output, *heartbeat),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["conch", "progress", "--total", "5", "--color", "never"]).unwrap();
        assert_eq!(cli.color, ColorChoice::Never);
        assert!(matches!(cli.command, Command::Progress { total: 5, .. }));
    }

    #[test]
    fn menu_options_default() {
        let cli = Cli::try_parse_from(["conch", "menu"]).unwrap();
        let Command::Menu { options, checkbox, .. } = cli.command else {
            panic!("expected menu");
        };
        assert_eq!(options, vec!["red", "green", "blue"]);
        assert!(!checkbox);
    }

    #[test]
    fn color_choice_maps_to_override() {
        assert_eq!(ColorChoice::Auto.colorful(), None);
        assert_eq!(ColorChoice::Always.colorful(), Some(true));
        assert_eq!(ColorChoice::Never.colorful(), Some(false));
    }

    #[test]
    fn rich_demo_renders_into_memory() {
        let (output, capture) = Output::memory(false);
        rich(&output, Some("<info>a</info> &amp; b")).unwrap();
        assert_eq!(capture.stdout.contents(), "a & b");
    }

    #[test]
    fn overwrite_demo_ends_done() {
        let (output, capture) = Output::memory(false);
        overwrite(&output, 2, Duration::ZERO).unwrap();
        assert!(capture.stdout.contents().ends_with("step 2/2 (done)\n"));
    }

    #[test]
    fn progress_demo_rejects_unknown_format() {
        let (output, _) = Output::memory(false);
        assert!(progress(&output, "fancy", 3, Duration::ZERO, None, false).is_err());
    }
}
