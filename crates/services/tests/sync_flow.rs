use std::sync::Arc;

use quiz_core::model::{AnswerOption, Question, QuizMode};
use quiz_core::time::fixed_now;
use services::{Clock, ImportPayload, PollOutcome, QuizSession, SyncService, parse_import};
use storage::cache::MemoryCache;
use storage::repository::{InMemoryRemote, RemoteStore};

const DECK_FILE: &str = r#"{
    "questions": [
        {
            "question": "Drug of choice for anaphylaxis?",
            "options": {"a": "Epinephrine", "b": "Diphenhydramine", "c": "Hydrocortisone"},
            "correct_answer": "a",
            "explanation": "IM epinephrine, without delay."
        },
        {
            "question": "Most sensitive early sign of hypovolemic shock?",
            "options": {"a": "Hypotension", "b": "Tachycardia"},
            "correct_answer": "b"
        }
    ],
    "folder": "Emergency"
}"#;

fn device(remote: &Arc<InMemoryRemote>, offset_seconds: i64) -> SyncService {
    let clock = Clock::fixed(fixed_now() + chrono::Duration::seconds(offset_seconds));
    SyncService::new(
        clock,
        Arc::new(MemoryCache::new()),
        Some(Arc::clone(remote) as Arc<dyn RemoteStore>),
    )
}

#[tokio::test]
async fn two_devices_converge_through_the_remote() {
    let remote = Arc::new(InMemoryRemote::new());
    let mut phone = device(&remote, 0);
    let mut laptop = device(&remote, 30);

    phone.load().await;

    // The phone imports a deck file and pushes it to the remote.
    let ImportPayload::Deck(import) = parse_import(DECK_FILE).expect("parse deck file") else {
        panic!("expected a deck payload");
    };
    let folder = import.folder().to_owned();
    let deck = import
        .into_deck("emergency basics", fixed_now())
        .expect("build deck");
    phone
        .mutate(|s| s.add_deck(&folder, deck))
        .await
        .expect("import on phone");
    assert!(phone.snapshot().deck("Emergency", "emergency basics").is_some());

    // The laptop's first load takes the remote copy unconditionally.
    laptop.load().await;
    let fetched = laptop
        .snapshot()
        .deck("Emergency", "emergency basics")
        .expect("deck propagated");
    assert_eq!(fetched.questions().len(), 2);

    // A quiz on the laptop commits only aggregate counts, which flow back.
    let mut session = QuizSession::new();
    let mut rng = rand::rng();
    assert!(session.start(fetched, QuizMode::Normal, &mut rng, fixed_now()));
    for index in 0..session.total_questions() {
        session.navigate(index);
        session.select_answer(index, "a").expect("valid option key");
    }
    let result = session
        .finish(fixed_now() + chrono::Duration::seconds(45))
        .expect("finish session");
    assert_eq!(result.correct() + result.incorrect(), 2);

    laptop
        .mutate(|s| {
            s.record_deck_session(
                "Emergency",
                "emergency basics",
                result.correct(),
                result.incorrect(),
            )
        })
        .await
        .expect("commit session");

    assert_eq!(phone.reconcile_poll().await, PollOutcome::Updated);
    let stats = phone
        .snapshot()
        .deck("Emergency", "emergency basics")
        .expect("deck on phone")
        .stats();
    assert_eq!(
        stats.attempted(),
        result.correct() + result.incorrect(),
        "aggregates propagate back"
    );
}

#[tokio::test]
async fn equal_timestamps_never_ping_pong() {
    let remote = Arc::new(InMemoryRemote::new());
    let mut phone = device(&remote, 0);
    phone.load().await;
    phone
        .mutate(|s| s.create_folder("Dermatology"))
        .await
        .expect("create folder");

    // A second device that synced the same write sees nothing new, poll
    // after poll.
    let mut laptop = device(&remote, 0);
    laptop.load().await;
    let before = format!("{:?}", laptop.snapshot());
    for _ in 0..3 {
        assert_eq!(laptop.reconcile_poll().await, PollOutcome::Unchanged);
    }
    assert_eq!(format!("{:?}", laptop.snapshot()), before);
}

#[tokio::test]
async fn backup_import_merges_without_clobbering() {
    let remote = Arc::new(InMemoryRemote::new());
    let mut sync = device(&remote, 0);
    sync.load().await;

    let question = Question::new(
        "Q",
        vec![AnswerOption::new("a", "Yes"), AnswerOption::new("b", "No")],
        "a",
        None,
    )
    .expect("build question");
    let deck = quiz_core::model::Deck::new("Existing", vec![question], fixed_now())
        .expect("build deck");
    sync.mutate(|s| s.add_deck("Surgery", deck))
        .await
        .expect("seed deck");

    let backup = format!(
        r#"{{
            "folders": {{
                "Surgery": {{"decks": [{{"name": "Restored", "questions": [{{
                    "question": "From backup?",
                    "options": {{"a": "Yes"}},
                    "correct_answer": "a"
                }}]}}], "subfolders": {{}}}}
            }},
            "expandedFolders": ["Surgery"],
            "version": "1.0",
            "exportDate": "{}"
        }}"#,
        fixed_now().to_rfc3339()
    );
    let ImportPayload::Backup(snapshot) = parse_import(&backup).expect("parse backup") else {
        panic!("expected a backup payload");
    };
    sync.import_merge(*snapshot).await.expect("merge backup");

    assert!(sync.snapshot().deck("Surgery", "Existing").is_some());
    assert!(sync.snapshot().deck("Surgery", "Restored").is_some());
    assert!(sync.snapshot().is_expanded("Surgery"));
}
