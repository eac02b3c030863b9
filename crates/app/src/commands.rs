use std::collections::HashMap;
use std::error::Error;
use std::io::Write;

use learn_core::model::{Accrual, LessonId, PostId, SubjectId, UserId};
use services::{AppServices, DashboardSnapshot, TutorError, TutorEvent};
use tracing::warn;

use crate::args::Command;

const SKIP_ANSWER: &str = "-";

pub async fn run(
    app: &AppServices,
    user: UserId,
    command: Command,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Lessons { subject } => lessons(app, user, subject).await,
        Command::View { lesson } => view(app, user, lesson).await,
        Command::WatchVideo { lesson, url } => watch_video(app, user, lesson, &url).await,
        Command::Quiz { lesson, answers } => quiz(app, user, lesson, &answers).await,
        Command::Dashboard { follow } => dashboard(app, user, follow).await,
        Command::Discuss {
            lesson,
            text,
            reply_to,
        } => discuss(app, user, lesson, text.as_deref(), reply_to).await,
        Command::Tutor { subject, question } => tutor(app, &subject, &question).await,
        Command::Profile { username, email } => {
            profile(app, user, username.as_deref(), email.as_deref()).await
        }
        Command::Seed => {
            let summary = app.seed_demo().await?;
            println!(
                "Seeded {} subjects, {} lessons and {} quiz",
                summary.subjects, summary.lessons, summary.quizzes
            );
            Ok(())
        }
    }
}

fn print_progress(accrual: &Accrual) {
    match accrual {
        Accrual::Unchanged => println!("Progress unchanged."),
        Accrual::Write {
            record,
            newly_completed,
        } => {
            println!("Progress: {}%", record.completion_percentage());
            if *newly_completed {
                println!("Lesson complete!");
            }
        }
    }
}

async fn lessons(
    app: &AppServices,
    user: UserId,
    subject: Option<SubjectId>,
) -> Result<(), Box<dyn Error>> {
    let catalog = app.catalog();
    if subject.is_none() {
        for s in catalog.subjects().await? {
            println!("# {} ({})", s.name(), s.id());
        }
    }
    let listings = catalog.lessons(user, subject).await?;
    if listings.is_empty() {
        println!("No lessons yet. Run `learn seed` to load the demo catalog.");
    }
    for listing in listings {
        let lesson = &listing.lesson;
        println!(
            "{}  {:>3}%  [{}] {}",
            lesson.id(),
            listing.completion_percentage,
            lesson.difficulty(),
            lesson.title()
        );
    }
    Ok(())
}

async fn view(app: &AppServices, user: UserId, id: LessonId) -> Result<(), Box<dyn Error>> {
    let lesson = app.catalog().lesson(id).await?;
    println!("{}", lesson.title());
    println!("{}", "=".repeat(lesson.title().chars().count()));
    println!("{}", lesson.content());
    if !lesson.tags().is_empty() {
        println!();
        println!("Tags: {}", lesson.tags().join(", "));
    }
    if !lesson.videos().is_empty() {
        println!();
        println!("Videos:");
        for video in lesson.videos() {
            println!("  {video}");
        }
    }
    println!();
    print_progress(&app.progress().record_content_view(user, id).await?);
    Ok(())
}

async fn watch_video(
    app: &AppServices,
    user: UserId,
    lesson: LessonId,
    url: &str,
) -> Result<(), Box<dyn Error>> {
    let accrual = app
        .progress()
        .record_video_watched(user, lesson, url)
        .await?;
    print_progress(&accrual);
    Ok(())
}

async fn quiz(
    app: &AppServices,
    user: UserId,
    lesson: LessonId,
    answers: &[String],
) -> Result<(), Box<dyn Error>> {
    let quizzes = app.quizzes();
    let mut attempt = quizzes.start(lesson).await?;

    if answers.is_empty() {
        let quiz = attempt.quiz();
        println!("{} ({} minutes)", quiz.title(), quiz.time_limit_secs() / 60);
        for (n, question) in quiz.questions().iter().enumerate() {
            println!();
            println!("{}. {}", n + 1, question.text());
            for option in question.options() {
                println!("   {}) {}", option.label, option.text);
            }
        }
        println!();
        println!("Answer with: learn quiz {lesson} <answers in order>");
        return Ok(());
    }

    let questions: Vec<_> = attempt.quiz().questions().iter().map(|q| q.id()).collect();
    if answers.len() > questions.len() {
        warn!(
            extra = answers.len() - questions.len(),
            "ignoring answers beyond the last question"
        );
    }
    for (question, label) in questions.into_iter().zip(answers) {
        if label != SKIP_ANSWER {
            quizzes.answer(&mut attempt, question, label)?;
        }
    }

    let submission = quizzes.submit(user, &mut attempt).await?;
    let outcome = submission.outcome;
    println!(
        "Score: {}% ({}/{} correct){}",
        outcome.score,
        outcome.correct,
        outcome.total,
        if outcome.timed_out { ", time ran out" } else { "" }
    );
    match &submission.progress {
        Some(progress) => print_progress(progress),
        None => println!("Time ran out before submitting; progress not updated."),
    }
    Ok(())
}

async fn print_dashboard(
    app: &AppServices,
    user: UserId,
    snapshot: &DashboardSnapshot,
) -> Result<(), Box<dyn Error>> {
    let titles: HashMap<LessonId, String> = app
        .catalog()
        .lessons(user, None)
        .await?
        .into_iter()
        .map(|l| (l.lesson.id(), l.lesson.title().to_owned()))
        .collect();
    let title = |id: LessonId| titles.get(&id).cloned().unwrap_or_else(|| id.to_string());

    let stats = &snapshot.stats;
    println!("Completed lessons: {}", stats.completed_lessons);
    println!("Average quiz score: {}%", stats.average_score);
    println!("In progress: {}", stats.in_progress.len());
    if !stats.recent.is_empty() {
        println!("Recent:");
        for row in &stats.recent {
            println!(
                "  {:>3}%  {}",
                row.completion_percentage(),
                title(row.lesson_id())
            );
        }
    }
    match &snapshot.next_lesson {
        Some(lesson) => println!("Next up: {} ({})", lesson.title(), lesson.id()),
        None => println!("Next up: nothing left, well done."),
    }
    Ok(())
}

async fn dashboard(app: &AppServices, user: UserId, follow: bool) -> Result<(), Box<dyn Error>> {
    let service = app.dashboard();
    if !follow {
        let snapshot = service.snapshot(user).await?;
        return print_dashboard(app, user, &snapshot).await;
    }

    let mut updates = service.watch(user, app.subscribe());
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else { return Ok(()) };
                match update {
                    Ok(snapshot) => {
                        print_dashboard(app, user, &snapshot).await?;
                        println!();
                    }
                    Err(err) => eprintln!("{err}"),
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

async fn discuss(
    app: &AppServices,
    user: UserId,
    lesson: LessonId,
    text: Option<&str>,
    reply_to: Option<PostId>,
) -> Result<(), Box<dyn Error>> {
    let discussions = app.discussions();
    if let Some(text) = text {
        let post = discussions.post(user, lesson, text, reply_to).await?;
        println!("Posted {}", post.id());
        return Ok(());
    }

    let posts = discussions.list(lesson).await?;
    if posts.is_empty() {
        println!("No posts yet.");
    }
    for entry in posts {
        println!(
            "[{}] {}: {} ({})",
            entry.post.created_at().format("%Y-%m-%d %H:%M"),
            entry.author,
            entry.post.content(),
            entry.post.id()
        );
    }
    Ok(())
}

async fn profile(
    app: &AppServices,
    user: UserId,
    username: Option<&str>,
    email: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let profiles = app.profiles();
    if let Some(email) = email {
        profiles.register(user, email).await?;
    }
    if let Some(username) = username {
        profiles.update_username(user, username).await?;
    }

    match profiles.get(user).await? {
        Some(profile) => {
            println!("Username: {}", profile.username());
            println!("Email:    {}", profile.email().unwrap_or("-"));
        }
        None => println!("No profile yet. Set one with --name or --email."),
    }
    Ok(())
}

async fn tutor(app: &AppServices, subject: &str, question: &str) -> Result<(), Box<dyn Error>> {
    let mut stream = app.tutor().ask(subject, &[], question).await?;
    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            event = stream.next() => {
                match event {
                    Some(Ok(TutorEvent::Delta(text))) => {
                        print!("{text}");
                        stdout.flush()?;
                    }
                    Some(Ok(TutorEvent::Finished(_))) => {
                        println!();
                        return Ok(());
                    }
                    None => {
                        println!();
                        return Err(TutorError::Interrupted.into());
                    }
                    Some(Err(err)) => {
                        println!();
                        return Err(err.into());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                return Ok(());
            }
        }
    }
}
