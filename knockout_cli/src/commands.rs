//! Subcommand parsing and execution.

use anyhow::{Context, Error, bail};
use knockout::bracket::{
    BracketEngine, BracketLayout, CategoryId, FlatMatchRequest, MatchId, ParticipantId,
};
use pico_args::Arguments;
use serde_json::{Value, json};
use std::{ffi::OsString, path::PathBuf};

/// A parsed subcommand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Migrate,
    Build {
        category: CategoryId,
        layout: PathBuf,
    },
    Generate {
        category: CategoryId,
        apply: bool,
    },
    Winner {
        match_id: MatchId,
        participant: ParticipantId,
    },
    Render {
        category: CategoryId,
    },
    Seed {
        participant: ParticipantId,
        category: CategoryId,
        seed: i32,
    },
    AddMatch {
        category: CategoryId,
        participants: Vec<ParticipantId>,
        round: Option<i32>,
        number: Option<i32>,
    },
}

impl Command {
    /// Subcommand name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::Migrate => "migrate",
            Command::Build { .. } => "build",
            Command::Generate { .. } => "generate",
            Command::Winner { .. } => "winner",
            Command::Render { .. } => "render",
            Command::Seed { .. } => "seed",
            Command::AddMatch { .. } => "add-match",
        }
    }

    /// Parse the subcommand and its options
    ///
    /// Global options must already be consumed from `pargs`; anything left
    /// over afterwards is an error.
    pub fn parse(mut pargs: Arguments) -> Result<Self, Error> {
        let Some(name) = pargs.subcommand()? else {
            bail!("missing subcommand (try --help)");
        };

        let command = match name.as_str() {
            "migrate" => Command::Migrate,
            "build" => Command::Build {
                category: pargs.value_from_str("--category")?,
                layout: pargs.value_from_os_str("--layout", |s| {
                    Ok::<_, std::convert::Infallible>(PathBuf::from(s))
                })?,
            },
            "generate" => Command::Generate {
                category: pargs.value_from_str("--category")?,
                apply: pargs.contains("--apply"),
            },
            "winner" => Command::Winner {
                match_id: pargs.value_from_str("--match")?,
                participant: pargs.value_from_str("--participant")?,
            },
            "render" => Command::Render {
                category: pargs.value_from_str("--category")?,
            },
            "seed" => Command::Seed {
                participant: pargs.value_from_str("--participant")?,
                category: pargs.value_from_str("--category")?,
                seed: pargs.value_from_str("--seed")?,
            },
            "add-match" => Command::AddMatch {
                category: pargs.value_from_str("--category")?,
                participants: pargs.value_from_fn("--participants", parse_id_list)?,
                round: pargs.opt_value_from_str("--round")?,
                number: pargs.opt_value_from_str("--number")?,
            },
            other => bail!("unknown subcommand: {other}"),
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            bail!("unexpected arguments: {}", display_args(&remaining));
        }

        Ok(command)
    }

    /// Run a subcommand against the engine and return its JSON output
    ///
    /// `Migrate` is handled by the caller before an engine exists.
    pub async fn execute(self, engine: &BracketEngine) -> Result<Value, Error> {
        match self {
            Command::Migrate => bail!("migrate runs without an engine"),
            Command::Build { category, layout } => {
                let raw = std::fs::read_to_string(&layout)
                    .with_context(|| format!("reading layout {}", layout.display()))?;
                let layout: BracketLayout =
                    serde_json::from_str(&raw).context("parsing layout JSON")?;
                let report = engine.build_bracket(category, &layout).await?;
                Ok(serde_json::to_value(report)?)
            }
            Command::Generate { category, apply } => {
                let entrants = engine.entrants(category).await?;
                let layout = BracketLayout::single_elimination(&entrants)?;
                if apply {
                    let report = engine.build_bracket(category, &layout).await?;
                    Ok(json!({ "layout": layout, "built": report }))
                } else {
                    Ok(serde_json::to_value(layout)?)
                }
            }
            Command::Winner {
                match_id,
                participant,
            } => {
                let report = engine.set_winner(match_id, participant).await?;
                Ok(serde_json::to_value(report)?)
            }
            Command::Render { category } => {
                let view = engine.render_bracket(category).await?;
                Ok(serde_json::to_value(view)?)
            }
            Command::Seed {
                participant,
                category,
                seed,
            } => {
                engine
                    .seeds()
                    .assign_seed(participant, category, seed)
                    .await?;
                Ok(json!({
                    "participant_id": participant,
                    "category_id": category,
                    "seed": seed,
                }))
            }
            Command::AddMatch {
                category,
                participants,
                round,
                number,
            } => {
                let request = FlatMatchRequest {
                    round,
                    match_number: number,
                    participant_ids: participants,
                };
                let match_id = engine.create_flat_match(category, request).await?;
                Ok(json!({ "match_id": match_id }))
            }
        }
    }
}

/// Parse a comma separated list of IDs, e.g. `4,9,12`
fn parse_id_list(raw: &str) -> Result<Vec<ParticipantId>, String> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<ParticipantId>()
                .map_err(|_| format!("invalid participant id {part:?}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if ids.is_empty() {
        return Err("expected at least one participant id".to_string());
    }
    Ok(ids)
}

fn display_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use knockout::store::MemoryStore;
    use std::sync::Arc;

    fn parse(args: &[&str]) -> Result<Command, Error> {
        Command::parse(Arguments::from_vec(
            args.iter().map(OsString::from).collect(),
        ))
    }

    #[test]
    fn test_parse_subcommands() {
        assert_eq!(parse(&["migrate"]).unwrap(), Command::Migrate);
        assert_eq!(
            parse(&["winner", "--match", "5", "--participant", "9"]).unwrap(),
            Command::Winner {
                match_id: 5,
                participant: 9
            }
        );
        assert_eq!(
            parse(&["generate", "--category", "2", "--apply"]).unwrap(),
            Command::Generate {
                category: 2,
                apply: true
            }
        );
        assert_eq!(
            parse(&["build", "--category", "2", "--layout", "bracket.json"]).unwrap(),
            Command::Build {
                category: 2,
                layout: PathBuf::from("bracket.json")
            }
        );
    }

    #[test]
    fn test_parse_add_match() {
        let command = parse(&[
            "add-match",
            "--category",
            "3",
            "--participants",
            "4, 7,9",
            "--round",
            "1",
        ])
        .unwrap();
        assert_eq!(
            command,
            Command::AddMatch {
                category: 3,
                participants: vec![4, 7, 9],
                round: Some(1),
                number: None,
            }
        );
        assert_eq!(command.name(), "add-match");
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["explode"]).is_err());
        assert!(parse(&["render"]).is_err());
        assert!(parse(&["render", "--category", "x"]).is_err());
        assert!(parse(&["render", "--category", "1", "--extra"]).is_err());
        assert!(parse(&["add-match", "--category", "1", "--participants", ","]).is_err());
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("1,2,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_id_list("1,two").is_err());
    }

    #[tokio::test]
    async fn test_execute_seed_generate_and_render() {
        let store = Arc::new(MemoryStore::new());
        let category = store.add_category("Open", 1).await;
        let a = store.add_participant(1, "A").await;
        let b = store.add_participant(1, "B").await;
        let engine = BracketEngine::new(store);

        for (participant, seed) in [(a, 1), (b, 2)] {
            Command::Seed {
                participant,
                category,
                seed,
            }
            .execute(&engine)
            .await
            .unwrap();
        }

        let preview = Command::Generate {
            category,
            apply: false,
        }
        .execute(&engine)
        .await
        .unwrap();
        assert_eq!(preview["matches"].as_array().unwrap().len(), 1);

        let built = Command::Generate {
            category,
            apply: true,
        }
        .execute(&engine)
        .await
        .unwrap();
        assert_eq!(built["built"]["matches"].as_array().unwrap().len(), 1);

        let view = Command::Render { category }.execute(&engine).await.unwrap();
        assert_eq!(view["rounds"].as_array().unwrap().len(), 1);
        assert_eq!(view["participants"][0]["seed"], 1);
    }

    #[tokio::test]
    async fn test_execute_surfaces_engine_errors() {
        let engine = BracketEngine::new(Arc::new(MemoryStore::new()));
        let err = Command::Winner {
            match_id: 1,
            participant: 1,
        }
        .execute(&engine)
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Match not found"));
    }
}
