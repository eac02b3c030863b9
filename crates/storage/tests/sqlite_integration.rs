use chrono::Duration;
use learn_core::model::{
    Difficulty, DiscussionPost, Lesson, LessonId, PostId, Profile, ProgressRecord, Quiz, Subject,
    SubjectId, UserId,
};
use learn_core::time::fixed_now;
use storage::Change;
use storage::repository::{
    DiscussionRepository, LessonRepository, ProfileRepository, ProgressRepository,
    QuizRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn lesson(subject: Option<SubjectId>, order: i32, videos: &[&str]) -> Lesson {
    Lesson::new(
        LessonId::random(),
        subject,
        format!("Lesson {order}"),
        "body",
        Difficulty::Intermediate,
        vec!["tag".into()],
        order,
        videos,
    )
    .unwrap()
}

fn progress(
    user: UserId,
    lesson: LessonId,
    pct: u8,
    score: Option<u8>,
    minutes: i64,
) -> ProgressRecord {
    let at = fixed_now() + Duration::minutes(minutes);
    ProgressRecord::from_persisted(user, lesson, pct, score, (pct == 100).then_some(at), at)
        .unwrap()
}

#[tokio::test]
async fn sqlite_roundtrips_catalog_in_order() {
    let repo = connect("memdb_catalog").await;

    let subject = Subject::new(SubjectId::random(), "Math", Some("Numbers".into()), None).unwrap();
    repo.upsert_subject(&subject).await.unwrap();
    let other = Subject::new(SubjectId::random(), "Art", None, Some("brush".into())).unwrap();
    repo.upsert_subject(&other).await.unwrap();

    let second = lesson(Some(subject.id()), 2, &[]);
    let first = lesson(
        Some(subject.id()),
        1,
        &["https://v.example.com/1", "https://v.example.com/2"],
    );
    let unrelated = lesson(Some(other.id()), 0, &[]);
    for l in [&second, &first, &unrelated] {
        repo.upsert_lesson(l).await.unwrap();
    }

    let subjects = repo.list_subjects().await.unwrap();
    assert_eq!(subjects, vec![other.clone(), subject.clone()]);

    let math = repo.list_lessons(Some(subject.id())).await.unwrap();
    assert_eq!(math, vec![first.clone(), second.clone()]);
    assert_eq!(repo.list_lessons(None).await.unwrap().len(), 3);

    let fetched = repo.get_lesson(first.id()).await.unwrap().unwrap();
    assert_eq!(fetched.video_count(), 2);
    assert_eq!(fetched.difficulty(), Difficulty::Intermediate);
    assert!(repo.get_lesson(LessonId::random()).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_progress_upsert_never_lowers_percentage() {
    let repo = connect("memdb_progress").await;
    let user = UserId::random();
    let lesson = LessonId::random();

    assert!(repo.get_progress(user, lesson).await.unwrap().is_none());

    repo.upsert_progress(&progress(user, lesson, 60, None, 0))
        .await
        .unwrap();
    // A stale writer tries to store an older, lower value.
    repo.upsert_progress(&progress(user, lesson, 30, None, 1))
        .await
        .unwrap();
    let stored = repo.get_progress(user, lesson).await.unwrap().unwrap();
    assert_eq!(stored.completion_percentage(), 60);
    assert_eq!(stored.updated_at(), fixed_now() + Duration::minutes(1));

    repo.upsert_progress(&progress(user, lesson, 100, Some(90), 2))
        .await
        .unwrap();
    let done = repo.get_progress(user, lesson).await.unwrap().unwrap();
    assert!(done.is_complete());
    assert_eq!(done.quiz_score(), Some(90));
    assert_eq!(done.completed_at(), Some(fixed_now() + Duration::minutes(2)));

    // Later writes keep the first completion time.
    repo.upsert_progress(&progress(user, lesson, 100, Some(95), 5))
        .await
        .unwrap();
    let again = repo.get_progress(user, lesson).await.unwrap().unwrap();
    assert_eq!(again.completed_at(), done.completed_at());
    assert_eq!(again.quiz_score(), Some(95));
}

#[tokio::test]
async fn sqlite_lists_progress_newest_first_and_publishes() {
    let repo = connect("memdb_progress_list").await;
    let mut changes = repo.changes().subscribe();
    let user = UserId::random();
    let (a, b) = (LessonId::random(), LessonId::random());

    repo.upsert_progress(&progress(user, a, 30, None, 0))
        .await
        .unwrap();
    repo.upsert_progress(&progress(user, b, 45, None, 3))
        .await
        .unwrap();
    repo.upsert_progress(&progress(UserId::random(), a, 30, None, 9))
        .await
        .unwrap();

    let rows = repo.list_progress_for_user(user).await.unwrap();
    let order: Vec<_> = rows.iter().map(ProgressRecord::lesson_id).collect();
    assert_eq!(order, vec![b, a]);

    assert_eq!(changes.recv().await.unwrap(), Change::Progress(user));
}

#[tokio::test]
async fn sqlite_counts_distinct_video_views() {
    let repo = connect("memdb_videos").await;
    let user = UserId::random();
    let lesson = LessonId::random();
    let now = fixed_now();

    let first = repo
        .record_video_view(user, lesson, "https://v.example.com/1", now)
        .await
        .unwrap();
    let repeat = repo
        .record_video_view(user, lesson, "https://v.example.com/1", now)
        .await
        .unwrap();
    let second = repo
        .record_video_view(user, lesson, "https://v.example.com/2", now)
        .await
        .unwrap();
    let other_user = repo
        .record_video_view(UserId::random(), lesson, "https://v.example.com/1", now)
        .await
        .unwrap();

    assert_eq!((first, repeat, second, other_user), (1, 1, 2, 1));
}

#[tokio::test]
async fn sqlite_replaces_quiz_for_lesson() {
    let repo = connect("memdb_quiz").await;
    let target = lesson(None, 0, &[]);
    repo.upsert_lesson(&target).await.unwrap();

    assert!(repo.get_quiz_for_lesson(target.id()).await.unwrap().is_none());

    let quiz = Quiz::fallback_for(target.id());
    repo.upsert_quiz(&quiz).await.unwrap();
    repo.upsert_quiz(&quiz).await.unwrap();

    let fetched = repo.get_quiz_for_lesson(target.id()).await.unwrap().unwrap();
    assert_eq!(fetched, quiz);
}

#[tokio::test]
async fn sqlite_threads_discussion_posts() {
    let repo = connect("memdb_discussion").await;
    let lesson = LessonId::random();
    let user = UserId::random();

    let root = DiscussionPost::new(PostId::random(), lesson, user, None, "first", fixed_now())
        .unwrap();
    repo.insert_post(&root).await.unwrap();
    let reply = DiscussionPost::new(
        PostId::random(),
        lesson,
        user,
        Some(root.id()),
        "reply",
        fixed_now() + Duration::seconds(5),
    )
    .unwrap();
    repo.insert_post(&reply).await.unwrap();

    let all = repo.list_posts(lesson, false).await.unwrap();
    assert_eq!(all, vec![reply.clone(), root.clone()]);
    let top = repo.list_posts(lesson, true).await.unwrap();
    assert_eq!(top, vec![root.clone()]);

    assert!(matches!(
        repo.insert_post(&root).await,
        Err(StorageError::Conflict)
    ));
    let orphan = DiscussionPost::new(
        PostId::random(),
        lesson,
        user,
        Some(PostId::random()),
        "lost",
        fixed_now(),
    )
    .unwrap();
    assert!(matches!(
        repo.insert_post(&orphan).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_upserts_profiles() {
    let repo = connect("memdb_profiles").await;
    let mut rx = repo.changes().subscribe();
    let user = UserId::random();
    assert!(repo.get_profile(user).await.unwrap().is_none());

    let profile = Profile::for_email(user, "grace@example.com", fixed_now()).unwrap();
    repo.upsert_profile(&profile).await.unwrap();
    assert_eq!(repo.get_profile(user).await.unwrap(), Some(profile.clone()));

    let renamed = profile
        .renamed("Grace H.", fixed_now() + Duration::minutes(1))
        .unwrap();
    repo.upsert_profile(&renamed).await.unwrap();
    let stored = repo.get_profile(user).await.unwrap().unwrap();
    assert_eq!(stored.username(), "Grace H.");
    assert_eq!(stored.email(), Some("grace@example.com"));
    assert_eq!(rx.recv().await.unwrap(), Change::Profile(user));
}
