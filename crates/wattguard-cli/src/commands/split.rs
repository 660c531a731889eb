//! Fair split command

use std::collections::BTreeSet;

use anyhow::{bail, Context, Result};
use wattguard_core::{calculation_details, share_text, Roster, SplitConfig, SplitSession};

/// Parse "Name" or "Name:Tag,Tag" into a name and its distinct tags
pub fn parse_person(spec: &str) -> Result<(String, BTreeSet<String>)> {
    let (name, tags) = match spec.split_once(':') {
        Some((name, tags)) => (name, tags),
        None => (spec, ""),
    };

    let name = name.trim();
    if name.is_empty() {
        bail!("Participant name cannot be empty: {:?}", spec);
    }

    let tags = tags
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    Ok((name.to_string(), tags))
}

/// Build a session from --person specs, or the default two-person roster
/// (first participant named from `owner`) when none are given
pub fn build_split_session(
    config: &SplitConfig,
    total: f64,
    persons: &[String],
    owner: Option<&str>,
) -> Result<SplitSession> {
    if persons.is_empty() {
        return SplitSession::new(total, owner, config).context("Failed to split bill");
    }
    if owner.is_some() {
        bail!("--owner names the default roster and cannot be combined with --person");
    }

    let parsed = persons
        .iter()
        .map(|p| parse_person(p))
        .collect::<Result<Vec<_>>>()?;

    let mut roster = Roster::new();
    for (name, _) in &parsed {
        roster.add_participant(name);
    }
    let ids: Vec<String> = roster.participants().iter().map(|p| p.id.clone()).collect();

    let mut session =
        SplitSession::with_roster(total, roster, config).context("Failed to split bill")?;

    for (id, (_, tags)) in ids.iter().zip(&parsed) {
        for tag in tags {
            if session.weights().is_predefined(tag) {
                session.toggle_tag(Some(id), tag);
            } else {
                session.add_custom_tag(Some(id), tag);
            }
        }
    }

    Ok(session)
}

pub fn cmd_split(
    config: &SplitConfig,
    total: f64,
    persons: &[String],
    owner: Option<&str>,
    json: bool,
    details: bool,
) -> Result<()> {
    let session = build_split_session(config, total, persons, owner)?;
    let Some(result) = session.result() else {
        bail!("Nothing to split");
    };

    if json {
        let mut out = serde_json::json!({
            "split": result,
            "share_text": share_text(result),
        });
        if details {
            out["details"] = serde_json::Value::String(calculation_details(result));
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "{:<20} {:>10} {:>10} {:>7}  Tags",
        "Name", "Share", "Adjust", "%"
    );
    println!("{}", "-".repeat(60));
    for a in &result.participants {
        let tags: Vec<&str> = a.tags.iter().map(|t| t.tag.as_str()).collect();
        println!(
            "{:<20} {:>10} {:>+10.2} {:>6.1}%  {}",
            a.name,
            format!("${:.2}", a.share),
            a.adjustment,
            a.percent,
            tags.join(", ")
        );
    }
    println!();
    println!("{}", share_text(result));

    if details {
        println!();
        print!("{}", calculation_details(result));
    }

    Ok(())
}
