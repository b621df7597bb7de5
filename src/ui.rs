// UI layer: renders machine data as aligned multi-line text and owns the
// two interactive bits (the difficulty prompt and the progress spinners).
// Rendering is pure string building so it can be tested without a
// terminal; callers decide when to print.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};

use crate::model::{
    parse_release, Group, MachineRecord, ReviewAccess, TodoEntry, DIFFICULTY_BUCKETS,
};

const BAR_WIDTH: usize = 50;

/// Render one machine the way the group demands: starting-point machines
/// get a short header block, lab machines additionally get the permalink,
/// the star bar and the ten-row difficulty histogram. `today` is injected
/// so the "days ago" math is deterministic under test.
pub fn render_machine(
    machine: &MachineRecord,
    group: Group,
    reviews: &ReviewAccess,
    today: NaiveDate,
) -> Result<String> {
    let released = machine.release_date()?;
    let date_str = released.format("%B %d, %Y").to_string();
    let days_ago = (today - released).num_days();

    if group == Group::StartingPoint {
        return Ok(format!(
            "\n      {} - {} {} - Starting Point - by {}\n      \
             Released {} ({} days ago)\n      \
             {} User Owns, {} Root Owns\n\n",
            machine.name,
            machine.difficulty_text,
            machine.os,
            machine.maker.name,
            date_str,
            days_ago,
            machine.user_owns_count,
            machine.root_owns_count,
        ));
    }

    let feedback = machine.feedback.as_ref().with_context(|| {
        format!("machine {} has no difficulty feedback data", machine.name)
    })?;

    let mut out = String::new();
    out.push_str(&format!(
        "\n      {} - {} {} - {} - by {}\n",
        machine.name,
        machine.difficulty_text,
        machine.os,
        group.label(),
        machine.maker.name
    ));
    out.push_str(&format!("      {}\n", machine.permalink()));
    out.push_str(&format!("      Released {date_str} ({days_ago} days ago)\n"));
    out.push_str(&format!(
        "      User Difficulty Rating {}/100\n",
        machine.difficulty
    ));
    out.push_str(&format!(
        "      {} User Owns, {} Root Owns\n",
        machine.user_owns_count, machine.root_owns_count
    ));

    // Review access is gated server-side; denial renders a placeholder
    // instead of a count.
    let rating_suffix = match reviews {
        ReviewAccess::Granted(list) => format!("{} Reviews", list.len()),
        ReviewAccess::Denied => "No Reviews".to_string(),
    };
    out.push_str(&format!(
        "\n      Rating - {}/5 Stars - {rating_suffix}\n",
        machine.stars
    ));
    out.push_str(&format!("         {}\n", star_bar(machine.stars)));
    if let ReviewAccess::Granted(list) = reviews {
        if list.iter().any(|review| review.user.name == machine.maker.name) {
            out.push_str("      including a self review by the author (cringe)\n");
        }
    }

    out.push_str("\n      Difficulty Ratings:\n");
    let max_votes = DIFFICULTY_BUCKETS
        .iter()
        .map(|bucket| feedback.get(*bucket).copied().unwrap_or(0))
        .max()
        .unwrap_or(0);
    for (index, bucket) in DIFFICULTY_BUCKETS.iter().enumerate() {
        let votes = feedback.get(*bucket).copied().unwrap_or(0);
        out.push_str(&format!(
            "      {:<2} {} {}\n",
            index + 1,
            histogram_bar(votes, max_votes),
            votes
        ));
    }
    out.push('\n');
    Ok(out)
}

/// One line of the to-do listing.
pub fn render_todo_line(entry: &TodoEntry, today: NaiveDate) -> Result<String> {
    let released = parse_release(&entry.release)?;
    let days_old = (today - released).num_days();
    Ok(format!(
        "{} - {} {} - Diff Rating {}/100 - {}/5 Stars - {} Days Old",
        entry.name, entry.difficulty_text, entry.os, entry.difficulty, entry.stars, days_old
    ))
}

/// Time left on an instance, `days, h:mm:ss` like a stopwatch readout.
/// Already-expired instances clamp to zero rather than counting up.
pub fn format_countdown(delta: Duration) -> String {
    let secs = delta.num_seconds().max(0);
    let days = secs / 86_400;
    let rem = secs % 86_400;
    let (hours, minutes, seconds) = (rem / 3_600, rem % 3_600 / 60, rem % 60);
    match days {
        0 => format!("{hours}:{minutes:02}:{seconds:02}"),
        1 => format!("1 day, {hours}:{minutes:02}:{seconds:02}"),
        _ => format!("{days} days, {hours}:{minutes:02}:{seconds:02}"),
    }
}

/// 50-wide star bar: one `#` per tenth of a star.
pub fn star_bar(stars: f64) -> String {
    bar((stars * 10.0).round() as usize)
}

/// 50-wide histogram bar scaled against the bucket with the most votes.
pub fn histogram_bar(votes: u64, max_votes: u64) -> String {
    if max_votes == 0 {
        return bar(0);
    }
    bar((votes as f64 / max_votes as f64 * BAR_WIDTH as f64).round() as usize)
}

fn bar(filled: usize) -> String {
    let filled = filled.min(BAR_WIDTH);
    format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

/// Ask for a self-rated difficulty until the answer is an integer in
/// [1,10].
pub fn prompt_difficulty() -> Result<u32> {
    loop {
        let raw: String = Input::new()
            .with_prompt("rate the difficulty 1-10")
            .interact_text()?;
        match raw.trim().parse::<u32>() {
            Ok(rating) if (1..=10).contains(&rating) => return Ok(rating),
            _ => println!("error: invalid input, must be an integer between 1 to 10 inclusive"),
        }
    }
}

/// Spinner shown around the slow calls (spawning, listing scans).
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.set_message(message.to_string());
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Maker, Review, ReviewUser};
    use std::collections::BTreeMap;

    fn lab_machine() -> MachineRecord {
        let mut feedback = BTreeMap::new();
        for bucket in DIFFICULTY_BUCKETS {
            feedback.insert(bucket.to_string(), 0);
        }
        feedback.insert("counterEasy".to_string(), 10);
        feedback.insert("counterMedium".to_string(), 50);
        feedback.insert("counterHard".to_string(), 5);
        MachineRecord {
            id: 1,
            name: "Lame".to_string(),
            os: "Linux".to_string(),
            difficulty_text: "Easy".to_string(),
            difficulty: 28,
            release: "2017-03-14T19:00:00.000000Z".to_string(),
            stars: 4.7,
            user_owns_count: 25000,
            root_owns_count: 26000,
            maker: Maker {
                name: "ch4p".to_string(),
            },
            ip: Some("10.10.10.3".to_string()),
            feedback: Some(feedback),
            retired: 1,
        }
    }

    fn reviews_by(names: &[&str]) -> ReviewAccess {
        ReviewAccess::Granted(
            names
                .iter()
                .map(|name| Review {
                    user: ReviewUser {
                        name: name.to_string(),
                    },
                })
                .collect(),
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 3, 24).unwrap()
    }

    #[test]
    fn star_bar_fills_one_hash_per_tenth() {
        assert_eq!(
            star_bar(3.5),
            format!("{}{}", "#".repeat(35), "-".repeat(15))
        );
        assert_eq!(star_bar(0.0), "-".repeat(50));
        assert_eq!(star_bar(5.0), "#".repeat(50));
    }

    #[test]
    fn histogram_bar_scales_against_the_max_bucket() {
        assert_eq!(
            histogram_bar(10, 50),
            format!("{}{}", "#".repeat(10), "-".repeat(40))
        );
        assert_eq!(histogram_bar(50, 50), "#".repeat(50));
        assert_eq!(
            histogram_bar(5, 50),
            format!("{}{}", "#".repeat(5), "-".repeat(45))
        );
        // all-zero histograms must not divide by zero
        assert_eq!(histogram_bar(0, 0), "-".repeat(50));
    }

    #[test]
    fn lab_rendering_includes_reviews_and_histogram() {
        let out = render_machine(
            &lab_machine(),
            Group::Retired,
            &reviews_by(&["someone", "ch4p"]),
            today(),
        )
        .unwrap();
        assert!(out.contains("Lame - Easy Linux - Retired - by ch4p"));
        assert!(out.contains("https://app.hackthebox.com/machines/1"));
        assert!(out.contains("Released March 14, 2017 (10 days ago)"));
        assert!(out.contains("User Difficulty Rating 28/100"));
        assert!(out.contains("Rating - 4.7/5 Stars - 2 Reviews"));
        assert!(out.contains("including a self review by the author (cringe)"));
        // counterMedium is bucket 5 and holds the max, so its row is solid
        assert!(out.contains(&format!("      5  {} 50", "#".repeat(50))));
        assert!(out.contains(&format!(
            "      3  {}{} 10",
            "#".repeat(10),
            "-".repeat(40)
        )));
        assert!(out.contains(&format!("      10 {} 0", "-".repeat(50))));
    }

    #[test]
    fn denied_reviews_render_a_placeholder() {
        let out = render_machine(
            &lab_machine(),
            Group::Retired,
            &ReviewAccess::Denied,
            today(),
        )
        .unwrap();
        assert!(out.contains("Rating - 4.7/5 Stars - No Reviews"));
        assert!(!out.contains("2 Reviews"));
        assert!(!out.contains("self review"));
    }

    #[test]
    fn no_self_review_line_without_an_author_review() {
        let out = render_machine(
            &lab_machine(),
            Group::Retired,
            &reviews_by(&["someone"]),
            today(),
        )
        .unwrap();
        assert!(out.contains("Rating - 4.7/5 Stars - 1 Reviews"));
        assert!(!out.contains("self review"));
    }

    #[test]
    fn starting_point_rendering_is_the_short_form() {
        let mut machine = lab_machine();
        machine.feedback = None;
        machine.ip = None;
        let out = render_machine(
            &machine,
            Group::StartingPoint,
            &ReviewAccess::Denied,
            today(),
        )
        .unwrap();
        assert!(out.contains("Lame - Easy Linux - Starting Point - by ch4p"));
        assert!(out.contains("Released March 14, 2017 (10 days ago)"));
        assert!(out.contains("25000 User Owns, 26000 Root Owns"));
        assert!(!out.contains("hackthebox.com/machines"));
        assert!(!out.contains("Difficulty Ratings"));
    }

    #[test]
    fn missing_feedback_on_a_lab_machine_is_an_error() {
        let mut machine = lab_machine();
        machine.feedback = None;
        let rendered = render_machine(&machine, Group::Active, &ReviewAccess::Denied, today());
        assert!(rendered.is_err());
    }

    #[test]
    fn todo_line_format() {
        let entry = TodoEntry {
            name: "Lame".to_string(),
            difficulty_text: "Easy".to_string(),
            difficulty: 28,
            os: "Linux".to_string(),
            release: "2017-03-14".to_string(),
            stars: 4.7,
        };
        assert_eq!(
            render_todo_line(&entry, today()).unwrap(),
            "Lame - Easy Linux - Diff Rating 28/100 - 4.7/5 Stars - 10 Days Old"
        );
    }

    #[test]
    fn countdown_formats_like_a_stopwatch() {
        assert_eq!(format_countdown(Duration::seconds(3_725)), "1:02:05");
        assert_eq!(
            format_countdown(Duration::seconds(86_400 + 3_725)),
            "1 day, 1:02:05"
        );
        assert_eq!(
            format_countdown(Duration::seconds(3 * 86_400)),
            "3 days, 0:00:00"
        );
        assert_eq!(format_countdown(Duration::seconds(-5)), "0:00:00");
    }
}
