//! Line-oriented terminal front end for a running session.

use tokio::io::{AsyncBufReadExt, BufReader};

use quiz_core::ResultAnalytics;
use quiz_core::model::ScoredResult;
use services::{
    QuizError, ResultDetail, ResultListItem, RunningSession, SessionEvent, SessionHandle,
    SessionPhase, SessionSnapshot,
};
use storage::repository::CategorySummary;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Answer(usize),
    Skip,
    Next,
    Previous,
    GoTo(usize),
    Submit,
    Retake,
    Show,
    Help,
    Quit,
    Unknown(String),
}

impl Input {
    /// Options and jump targets are 1-based on screen, 0-based here.
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (None, _) => Self::Show,
            (Some("s" | "skip"), None) => Self::Skip,
            (Some("n" | "next"), None) => Self::Next,
            (Some("p" | "prev"), None) => Self::Previous,
            (Some("g" | "goto"), Some(raw)) => match raw.parse::<usize>() {
                Ok(k) if k > 0 => Self::GoTo(k - 1),
                _ => Self::Unknown(line.to_owned()),
            },
            (Some("submit"), None) => Self::Submit,
            (Some("r" | "retake"), None) => Self::Retake,
            (Some("h" | "help" | "?"), None) => Self::Help,
            (Some("q" | "quit"), None) => Self::Quit,
            (Some(raw), None) => match raw.parse::<usize>() {
                Ok(k) if k > 0 => Self::Answer(k - 1),
                _ => Self::Unknown(line.to_owned()),
            },
            _ => Self::Unknown(line.to_owned()),
        }
    }
}

fn print_help() {
    println!("  1..n      answer with option n");
    println!("  s         skip this question");
    println!("  n / p     next / previous question");
    println!("  g <k>     jump to question k");
    println!("  submit    finish and score the quiz");
    println!("  r         retake after submitting");
    println!("  q         quit");
}

fn mm_ss(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Drive a running session from stdin until the user quits or input ends.
///
/// # Errors
///
/// Returns an error if stdin fails or the runner stops unexpectedly.
pub async fn play(running: RunningSession) -> Result<(), Box<dyn std::error::Error>> {
    let RunningSession {
        handle,
        mut events,
        task,
    } = running;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_help();
    render(&handle.snapshot().await?);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_input(&handle, Input::parse(&line)).await? {
                    break;
                }
            }
            Some(event) = events.recv() => on_event(event),
        }
    }

    handle.close().await;
    task.await?;
    Ok(())
}

/// Returns false when the user asked to quit.
async fn handle_input(handle: &SessionHandle, input: Input) -> Result<bool, QuizError> {
    match input {
        Input::Answer(option) => {
            let snapshot = handle.snapshot().await?;
            let chosen = snapshot
                .current
                .as_ref()
                .and_then(|q| q.options().get(option).cloned());
            let Some(answer) = chosen else {
                println!("No option {}.", option + 1);
                return Ok(true);
            };
            if handle.answer_current(answer).await? {
                handle.next().await?;
            } else {
                println!("No active question to answer.");
            }
        }
        Input::Skip => {
            if handle.skip_current().await? {
                handle.next().await?;
            }
        }
        Input::Next => {
            handle.next().await?;
        }
        Input::Previous => {
            handle.previous().await?;
        }
        Input::GoTo(index) => {
            if !handle.go_to(index).await? {
                println!("Cannot jump to question {}.", index + 1);
            }
        }
        Input::Submit => {
            let snapshot = handle.snapshot().await?;
            if snapshot.progress.phase == SessionPhase::Active && snapshot.progress.unanswered > 0 {
                println!(
                    "Submitting with {} unanswered question(s).",
                    snapshot.progress.unanswered
                );
            }
            match handle.submit().await {
                // The result arrives as a `Submitted` event.
                Ok(_) => return Ok(true),
                Err(err) if err.is_retryable() => return Ok(true),
                Err(err) => return Err(err),
            }
        }
        Input::Retake => {
            if !handle.retake().await? {
                println!("Retake is available after submitting.");
            }
        }
        Input::Show => {}
        Input::Help => print_help(),
        Input::Quit => return Ok(false),
        Input::Unknown(raw) => {
            println!("Unrecognized input: {raw:?} (type h for help)");
            return Ok(true);
        }
    }
    render(&handle.snapshot().await?);
    Ok(true)
}

fn on_event(event: SessionEvent) {
    match event {
        SessionEvent::Tick(progress) => {
            if matches!(progress.remaining_secs, 60 | 30 | 10) {
                println!("{} left.", mm_ss(progress.remaining_secs));
            }
        }
        SessionEvent::QuestionOverBudget { index } => {
            println!("Question {} is taking longer than expected.", index + 1);
        }
        SessionEvent::Expired => println!("Time is up."),
        SessionEvent::Submitted(result) => {
            print_result(&result, &ResultAnalytics::from_result(&result));
            println!("Type r to retake or q to quit.");
        }
        SessionEvent::PersistFailed { reason } => {
            println!("Could not save the result: {reason}");
            println!("Type submit to try again.");
        }
    }
}

fn render(snapshot: &SessionSnapshot) {
    let progress = &snapshot.progress;
    if progress.phase != SessionPhase::Active {
        return;
    }
    let Some(question) = &snapshot.current else {
        return;
    };

    println!();
    println!(
        "[{}] Question {}/{}  answered {}/{}  time left {}  on question {} ({:.0}%)",
        snapshot.topic,
        progress.current_index + 1,
        progress.total,
        progress.answered,
        progress.total,
        mm_ss(progress.remaining_secs),
        mm_ss(progress.question_elapsed_secs),
        progress.question_percent_remaining,
    );
    println!("{}", question.text());
    for (i, option) in question.options().iter().enumerate() {
        println!("  {}) {option}", i + 1);
    }
    if let Some(record) = &snapshot.current_record {
        if record.skipped {
            println!("(skipped)");
        } else {
            println!("Your answer: {}", record.answer);
        }
    }
}

fn print_result(result: &ScoredResult, analytics: &ResultAnalytics) {
    println!();
    println!(
        "Score {}/{} ({:.0}%) on {} in {}",
        result.score(),
        result.total_questions(),
        analytics.accuracy_pct,
        result.topic(),
        mm_ss(result.time_spent()),
    );
    println!(
        "Skipped {}, unanswered {}",
        analytics.skipped, analytics.unanswered
    );

    println!("By category:");
    for stat in &analytics.categories {
        println!(
            "  {:<12} {}/{} ({:.0}%)",
            stat.category,
            stat.correct,
            stat.total,
            stat.accuracy_pct()
        );
    }

    let timing = &analytics.timing;
    println!(
        "Time on questions {}s, average {:.1}s",
        timing.total_question_secs, timing.average_secs
    );
    if let (Some(fastest), Some(slowest)) = (&timing.fastest, &timing.slowest) {
        println!(
            "Fastest: question {} ({}s), slowest: question {} ({}s)",
            fastest.position + 1,
            fastest.time_spent,
            slowest.position + 1,
            slowest.time_spent
        );
    }

    for (i, qr) in result.question_results().iter().enumerate() {
        let mark = if qr.is_correct {
            "+"
        } else if qr.skipped {
            "~"
        } else {
            "x"
        };
        println!("  {mark} {}. {}", i + 1, qr.question_text);
        if !qr.is_correct {
            println!("      correct: {}", qr.correct_answer);
        }
    }
}

pub fn print_categories(categories: &[CategorySummary]) {
    if categories.is_empty() {
        println!("No categories found.");
        return;
    }
    for category in categories {
        println!(
            "{:<16} {:<16} {} question(s)",
            category.id, category.display_name, category.count
        );
    }
}

pub fn print_history(items: &[ResultListItem]) {
    if items.is_empty() {
        println!("No past attempts.");
        return;
    }
    for item in items {
        println!(
            "#{:<4} {}  {:<12} {}/{}  {}",
            item.id,
            item.completed_at.format("%Y-%m-%d %H:%M"),
            item.topic,
            item.score,
            item.total_questions,
            mm_ss(item.time_spent),
        );
    }
}

pub fn print_detail(detail: &ResultDetail) {
    print_result(&detail.result, &detail.analytics);
}
