use std::fs;
use std::io::{self, Read};

use clap::{Parser, Subcommand};

use rfseeker::action::{self, ElementState};
use rfseeker::dom::NoopEventSink;
use rfseeker::expect::{self, ExpectExpression, ExpectParams};
use rfseeker::html_loader::load_document;
use rfseeker::selector::text::{ExpectedTextMatcher, TextMatcher};
use rfseeker::{CoreConfig, DocumentContext};

#[derive(Parser)]
#[clap(author, version, about, long_about = "Loads a static HTML document and runs selector/action-readiness operations against it.")]
struct Cli {
    /// Path to the HTML document to load (omit to read from stdin)
    #[clap(long, global = true)]
    html: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a selector to at most one element (fails on strict violation)
    Query {
        selector: String,
        /// Disable strict uniqueness (first match wins instead of erroring)
        #[clap(long, action = clap::ArgAction::SetTrue)]
        no_strict: bool,
    },
    /// Resolve a selector to every matching element
    QueryAll { selector: String },
    /// Report whether an element satisfies a state
    WaitState {
        selector: String,
        /// One of: visible, hidden, enabled, disabled, editable, checked
        state: String,
    },
    /// Fill a form control with a value
    Fill { selector: String, value: String },
    /// Evaluate an expect() expression against a selector's matches
    Expect {
        selector: String,
        /// e.g. to.be.visible, to.have.text, to.have.count
        expression: String,
        /// Expected string (for string receivers) or number (for to.have.count)
        #[clap(long)]
        expected: Option<String>,
        #[clap(long, action = clap::ArgAction::SetTrue)]
        is_not: bool,
    },
}

fn load_html(cli: &Cli) -> anyhow::Result<String> {
    match &cli.html {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let html = load_html(&cli)?;
    let mut dom = load_document(&html);
    let root = dom.root();
    let ctx = DocumentContext::new(CoreConfig::default());

    match cli.command {
        Commands::Query { selector, no_strict } => match ctx.query_selector(&dom, root, &selector, !no_strict) {
            Ok(Some(id)) => println!("{}", action::preview(&dom, id)),
            Ok(None) => println!("(no match)"),
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
        Commands::QueryAll { selector } => match ctx.query_selector_all(&dom, root, &selector) {
            Ok(ids) => {
                for id in ids {
                    println!("{}", action::preview(&dom, id));
                }
            }
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
        Commands::WaitState { selector, state } => {
            let state = parse_state(&state)?;
            match ctx.query_selector(&dom, root, &selector, true) {
                Ok(Some(id)) => match action::element_state(&dom, id, state) {
                    Ok(result) => println!("{result}"),
                    Err(e) => println!("{e}"),
                },
                Ok(None) => println!("(no match)"),
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Fill { selector, value } => {
            match ctx.query_selector(&dom, root, &selector, true) {
                Ok(Some(id)) => {
                    let mut sink = NoopEventSink;
                    match action::fill(&mut dom, &mut sink, id, &value) {
                        Ok(outcome) => println!("{outcome:?}"),
                        Err(e) => {
                            eprintln!("error: {e}");
                            std::process::exit(1);
                        }
                    }
                }
                Ok(None) => println!("(no match)"),
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Expect { selector, expression, expected, is_not } => {
            let expr = ExpectExpression::parse(&expression)?;
            let elements = ctx.query_selector_all(&dom, root, &selector)?;
            let mut params = ExpectParams { is_not, ..Default::default() };
            if expression == "to.have.count" {
                params.expected_number = expected.as_deref().and_then(|s| s.parse().ok());
            } else if let Some(expected) = &expected {
                params.expected_text = vec![ExpectedTextMatcher { matcher: TextMatcher::Lax(expected.clone()), normalize_whitespace: true }];
            }
            let result = expect::expect(&dom, &expr, &elements, &params)?;
            println!("pass={} received={:?}", result.pass, result.received);
            for line in result.log {
                println!("{line}");
            }
        }
    }

    Ok(())
}

fn parse_state(s: &str) -> anyhow::Result<ElementState> {
    Ok(match s {
        "visible" => ElementState::Visible,
        "hidden" => ElementState::Hidden,
        "enabled" => ElementState::Enabled,
        "disabled" => ElementState::Disabled,
        "editable" => ElementState::Editable,
        "checked" => ElementState::Checked,
        "stable" => ElementState::Stable,
        other => anyhow::bail!("unknown state \"{other}\" (expected one of: visible, hidden, enabled, disabled, editable, checked, stable)"),
    })
}
