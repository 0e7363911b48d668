use quap_core::db::open_db_in_memory;
use quap_core::{
    run_import, ContentRepository, FixedClock, ImportConfig, ImportError, ImportResult,
    ImportService, ImportSummary, Lifecycle, LocalId, QuestionnaireStream,
    SqliteContentRepository, StreamError,
};
use rusqlite::Connection;
use serde_json::json;
use std::io::Cursor;

const SCENARIO: &str = r#"[{"id":null,"type":"intake","aspects":[{"id":1,"name_de":"A","name_fr":"A","name_it":"A","questions":[{"id":1,"question_de":"Q","question_fr":"Q","question_it":"Q","answer_options":["yes","no"],"help":[]}]}]}]"#;

fn import(conn: &Connection, clock: &FixedClock, document: &str) -> ImportResult<ImportSummary> {
    let repo = SqliteContentRepository::try_new(conn).unwrap();
    let service = ImportService::new(repo, clock);
    let stream = QuestionnaireStream::new(Cursor::new(document.as_bytes().to_vec()));
    service.import_records(stream)
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}

fn snapshot(conn: &Connection) -> Vec<String> {
    let queries = [
        "SELECT id || '|' || type FROM questionnaires ORDER BY id",
        "SELECT uuid || '|' || questionnaire_id || '|' || local_id || '|' || name_de || '|'
                || created_at || '|' || IFNULL(deleted_at, '-')
         FROM aspects ORDER BY rowid",
        "SELECT uuid || '|' || aspect_uuid || '|' || local_id || '|' || question_de || '|'
                || answer_options || '|' || created_at || '|' || IFNULL(deleted_at, '-')
         FROM questions ORDER BY rowid",
        "SELECT uuid || '|' || question_uuid || '|' || local_id || '|' || help_de || '|'
                || severity || '|' || created_at || '|' || IFNULL(deleted_at, '-')
         FROM help_items ORDER BY rowid",
    ];
    let mut lines = Vec::new();
    for sql in queries {
        let mut stmt = conn.prepare(sql).unwrap();
        let mut rows = stmt.query([]).unwrap();
        while let Some(row) = rows.next().unwrap() {
            lines.push(row.get::<_, String>(0).unwrap());
        }
    }
    lines
}

fn document(aspects: serde_json::Value) -> String {
    json!([{ "id": 7, "type": "intake", "aspects": aspects }]).to_string()
}

fn aspect(id: u64, name: &str, questions: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id, "name_de": name, "name_fr": name, "name_it": name,
        "questions": questions
    })
}

fn question(id: u64, text: &str, help: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id, "question_de": text, "question_fr": text, "question_it": text,
        "answer_options": ["yes", "no"],
        "help": help
    })
}

fn help(id: u64, text: &str) -> serde_json::Value {
    json!({
        "id": id, "help_de": text, "help_fr": text, "help_it": text, "severity": "info"
    })
}

fn with_flag(mut node: serde_json::Value, deprecated: bool) -> serde_json::Value {
    node["deprecated"] = json!(deprecated);
    node
}

#[test]
fn scenario_document_imported_twice_yields_one_node_per_level() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_000);

    let first = import(&conn, &clock, SCENARIO).unwrap();
    clock.set(2_000);
    let second = import(&conn, &clock, SCENARIO).unwrap();

    assert_eq!(count(&conn, "questionnaires"), 1);
    assert_eq!(count(&conn, "aspects"), 1);
    assert_eq!(count(&conn, "questions"), 1);
    assert_eq!(count(&conn, "help_items"), 0);
    assert_eq!(first.questionnaires.created, 1);
    assert_eq!(second.questionnaires.updated, 1);
    assert_eq!(second.questions.created, 0);
    assert_eq!(second.questions.updated, 1);

    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let questionnaire = repo.find_questionnaire_by_kind("intake").unwrap().unwrap();
    let aspect = repo
        .find_aspect(questionnaire.id, &LocalId::from("1"))
        .unwrap()
        .unwrap();
    let question = repo
        .find_question(aspect.uuid, &LocalId::from("1"))
        .unwrap()
        .unwrap();
    assert_eq!(question.answer_options, vec![json!("yes"), json!("no")]);
}

#[test]
fn reimporting_same_document_leaves_store_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_000);
    let doc = document(json!([
        aspect(1, "A", json!([question(1, "Q1", json!([help(1, "H1"), help(2, "H2")]))])),
        with_flag(aspect(2, "B", json!([question(1, "Q2", json!([help(1, "H3")]))])), true),
    ]));

    import(&conn, &clock, &doc).unwrap();
    let after_first = snapshot(&conn);
    clock.set(5_000);
    let second = import(&conn, &clock, &doc).unwrap();

    assert_eq!(snapshot(&conn), after_first);
    assert_eq!(second.aspects.created, 0);
    assert_eq!(second.help_items.created, 0);
    assert_eq!(second.help_items.updated, 3);
    assert_eq!(second.aspects.deleted, 0);
}

#[test]
fn reimport_refreshes_text_but_keeps_creation_timestamp() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_000);
    import(
        &conn,
        &clock,
        &document(json!([aspect(1, "Old", json!([question(1, "Old", json!([help(1, "Old")]))]))])),
    )
    .unwrap();

    clock.set(9_000);
    import(
        &conn,
        &clock,
        &document(json!([aspect(1, "New", json!([question(1, "New", json!([help(1, "New")]))]))])),
    )
    .unwrap();

    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let aspect = repo.find_aspect(7, &LocalId::from("1")).unwrap().unwrap();
    let question = repo
        .find_question(aspect.uuid, &LocalId::from("1"))
        .unwrap()
        .unwrap();
    let help = repo
        .find_help_item(question.uuid, &LocalId::from("1"))
        .unwrap()
        .unwrap();
    assert_eq!(aspect.name.de, "New");
    assert_eq!(question.text.it, "New");
    assert_eq!(help.text.fr, "New");
    assert_eq!(aspect.created_at, 1_000);
    assert_eq!(question.created_at, 1_000);
    assert_eq!(help.created_at, 1_000);
}

#[test]
fn answer_options_are_fixed_at_creation() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_000);
    import(&conn, &clock, SCENARIO).unwrap();

    let revised = SCENARIO.replace(r#"["yes","no"]"#, r#"["always","never","sometimes"]"#);
    import(&conn, &clock, &revised).unwrap();

    let stored: String = conn
        .query_row("SELECT answer_options FROM questions;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(stored, r#"["yes","no"]"#);
}

#[test]
fn deprecated_aspect_cascades_to_every_descendant() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(3_000);
    let doc = document(json!([with_flag(
        aspect(
            1,
            "A",
            json!([
                question(1, "Q1", json!([help(1, "H1"), help(2, "H2")])),
                question(2, "Q2", json!([]))
            ])
        ),
        true
    )]));

    let summary = import(&conn, &clock, &doc).unwrap();

    let active: i64 = conn
        .query_row(
            "SELECT (SELECT COUNT(*) FROM aspects WHERE deleted_at IS NULL)
                  + (SELECT COUNT(*) FROM questions WHERE deleted_at IS NULL)
                  + (SELECT COUNT(*) FROM help_items WHERE deleted_at IS NULL);",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(active, 0);
    let deleted_at: i64 = conn
        .query_row("SELECT MIN(deleted_at) FROM help_items;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(deleted_at, 3_000);
    assert_eq!(summary.questions.deleted, 2);
    assert_eq!(summary.help_items.deleted, 2);
}

#[test]
fn explicit_false_under_deprecated_parent_keeps_node_and_its_default() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(3_000);
    let doc = document(json!([with_flag(
        aspect(
            1,
            "A",
            json!([
                question(1, "inherits", json!([help(1, "H")])),
                with_flag(
                    question(2, "kept", json!([help(1, "inherits false"), with_flag(help(2, "own flag"), true)])),
                    false
                )
            ])
        ),
        true
    )]));

    import(&conn, &clock, &doc).unwrap();

    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let aspect = repo.find_aspect(7, &LocalId::from("1")).unwrap().unwrap();
    let inherits = repo
        .find_question(aspect.uuid, &LocalId::from("1"))
        .unwrap()
        .unwrap();
    let kept = repo
        .find_question(aspect.uuid, &LocalId::from("2"))
        .unwrap()
        .unwrap();
    let kept_help = repo.list_help_items(kept.uuid).unwrap();

    assert_eq!(aspect.lifecycle, Lifecycle::DeletedAt(3_000));
    assert_eq!(inherits.lifecycle, Lifecycle::DeletedAt(3_000));
    assert_eq!(kept.lifecycle, Lifecycle::Active);
    assert_eq!(kept_help[0].lifecycle, Lifecycle::Active);
    assert_eq!(kept_help[1].lifecycle, Lifecycle::DeletedAt(3_000));
}

#[test]
fn null_flag_under_deprecated_parent_acts_as_explicit_false() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_000);
    let mut nulled = question(1, "nulled", json!([help(1, "H")]));
    nulled["deprecated"] = serde_json::Value::Null;
    let doc = document(json!([with_flag(aspect(1, "A", json!([nulled])), true)]));

    import(&conn, &clock, &doc).unwrap();

    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let aspect = repo.find_aspect(7, &LocalId::from("1")).unwrap().unwrap();
    let question = repo
        .find_question(aspect.uuid, &LocalId::from("1"))
        .unwrap()
        .unwrap();
    let help = repo.list_help_items(question.uuid).unwrap();
    assert_eq!(aspect.lifecycle, Lifecycle::DeletedAt(1_000));
    assert_eq!(question.lifecycle, Lifecycle::Active);
    assert_eq!(help[0].lifecycle, Lifecycle::Active);
}

#[test]
fn deletion_survives_later_imports_without_the_flag() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_000);
    let deprecated = document(json!([with_flag(aspect(1, "A", json!([])), true)]));
    let plain = document(json!([aspect(1, "A", json!([])), aspect(2, "B", json!([]))]));
    let explicit_false = document(json!([with_flag(aspect(1, "A", json!([])), false)]));

    import(&conn, &clock, &deprecated).unwrap();
    clock.set(2_000);
    import(&conn, &clock, &plain).unwrap();
    clock.set(3_000);
    import(&conn, &clock, &explicit_false).unwrap();
    clock.set(4_000);
    import(&conn, &clock, &deprecated).unwrap();

    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let first = repo.find_aspect(7, &LocalId::from("1")).unwrap().unwrap();
    let second = repo.find_aspect(7, &LocalId::from("2")).unwrap().unwrap();
    assert_eq!(first.lifecycle, Lifecycle::DeletedAt(1_000));
    assert_eq!(second.lifecycle, Lifecycle::Active);
}

#[test]
fn same_local_id_under_different_questionnaires_does_not_collide() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_000);
    let doc = json!([
        { "id": 1, "type": "intake", "aspects": [aspect(1, "Intake", json!([]))] },
        { "id": 2, "type": "review", "aspects": [aspect(1, "Review", json!([]))] }
    ])
    .to_string();

    import(&conn, &clock, &doc).unwrap();
    import(&conn, &clock, &doc).unwrap();

    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let intake = repo.find_aspect(1, &LocalId::from("1")).unwrap().unwrap();
    let review = repo.find_aspect(2, &LocalId::from("1")).unwrap().unwrap();
    assert_ne!(intake.uuid, review.uuid);
    assert_eq!(intake.name.de, "Intake");
    assert_eq!(review.name.de, "Review");
    assert_eq!(count(&conn, "aspects"), 2);
}

#[test]
fn string_and_integer_local_ids_resolve_to_same_node() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_000);
    import(&conn, &clock, &document(json!([aspect(5, "int", json!([]))]))).unwrap();

    let mut by_text = aspect(5, "text", json!([]));
    by_text["id"] = json!("5");
    import(&conn, &clock, &document(json!([by_text]))).unwrap();

    assert_eq!(count(&conn, "aspects"), 1);
    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let stored = repo.find_aspect(7, &LocalId::from("5")).unwrap().unwrap();
    assert_eq!(stored.name.de, "text");
}

#[test]
fn duplicate_local_ids_in_one_batch_last_one_wins() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_000);
    let doc = document(json!([aspect(1, "first", json!([])), aspect(1, "second", json!([]))]));

    let summary = import(&conn, &clock, &doc).unwrap();

    assert_eq!(count(&conn, "aspects"), 1);
    assert_eq!((summary.aspects.created, summary.aspects.updated), (1, 1));
    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let stored = repo.find_aspect(7, &LocalId::from("1")).unwrap().unwrap();
    assert_eq!(stored.name.de, "second");
}

#[test]
fn questionnaire_with_explicit_id_is_created_then_updated_in_place() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_000);
    import(&conn, &clock, r#"[{"id": 12, "type": "draft", "aspects": []}]"#).unwrap();
    import(&conn, &clock, r#"[{"id": 12, "type": "final", "aspects": []}]"#).unwrap();

    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    let all = repo.list_questionnaires().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, 12);
    assert_eq!(all[0].kind, "final");
}

#[test]
fn null_id_attaches_to_lowest_id_questionnaire_of_same_type() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_000);
    import(
        &conn,
        &clock,
        r#"[{"id": 30, "type": "intake", "aspects": []},
            {"id": 20, "type": "intake", "aspects": []}]"#,
    )
    .unwrap();

    let summary = import(
        &conn,
        &clock,
        &json!([{ "id": null, "type": "intake", "aspects": [aspect(1, "A", json!([]))] }])
            .to_string(),
    )
    .unwrap();

    assert_eq!(summary.questionnaires.created, 0);
    assert_eq!(count(&conn, "questionnaires"), 2);
    let repo = SqliteContentRepository::try_new(&conn).unwrap();
    assert!(repo.find_aspect(20, &LocalId::from("1")).unwrap().is_some());
    assert!(repo.find_aspect(30, &LocalId::from("1")).unwrap().is_none());
}

#[test]
fn empty_document_completes_without_changes() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_000);

    let summary = import(&conn, &clock, "[]").unwrap();

    assert_eq!(summary, ImportSummary::default());
    assert_eq!(count(&conn, "questionnaires"), 0);
}

#[test]
fn malformed_stream_aborts_but_keeps_earlier_records() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_000);
    let doc = format!(
        "[{}, {{\"type\": \"broken\", \"aspects\": [",
        json!({ "id": 1, "type": "intake", "aspects": [aspect(1, "A", json!([]))] })
    );

    let err = import(&conn, &clock, &doc).unwrap_err();

    assert!(matches!(
        err,
        ImportError::Stream(StreamError::Malformed { index: 1, .. })
    ));
    assert_eq!(count(&conn, "questionnaires"), 1);
    assert_eq!(count(&conn, "aspects"), 1);
}

#[test]
fn missing_help_list_is_a_missing_field_error() {
    let conn = open_db_in_memory().unwrap();
    let clock = FixedClock::new(1_000);
    let mut incomplete = question(1, "Q", json!([]));
    incomplete.as_object_mut().unwrap().remove("help");
    let doc = document(json!([aspect(1, "A", json!([incomplete]))]));

    let err = import(&conn, &clock, &doc).unwrap_err();

    match err {
        ImportError::Stream(StreamError::MissingField { index, message }) => {
            assert_eq!(index, 0);
            assert!(message.contains("help"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count(&conn, "questionnaires"), 0);
}

#[test]
fn persistence_failure_keeps_already_committed_nodes() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_help BEFORE INSERT ON help_items
         WHEN NEW.local_id = '2'
         BEGIN
             SELECT RAISE(ABORT, 'help item rejected');
         END;",
    )
    .unwrap();
    let clock = FixedClock::new(1_000);
    let doc = document(json!([aspect(
        1,
        "A",
        json!([question(1, "Q", json!([help(1, "ok"), help(2, "rejected"), help(3, "never")]))])
    )]));

    let err = import(&conn, &clock, &doc).unwrap_err();

    assert!(matches!(err, ImportError::Repo(_)));
    assert_eq!(count(&conn, "questions"), 1);
    let stored: Vec<String> = {
        let mut stmt = conn
            .prepare("SELECT local_id FROM help_items ORDER BY rowid;")
            .unwrap();
        let rows = stmt.query_map([], |row| row.get(0)).unwrap();
        rows.map(|row| row.unwrap()).collect()
    };
    assert_eq!(stored, vec!["1".to_string()]);

    conn.execute_batch("DROP TRIGGER reject_help;").unwrap();
    import(&conn, &clock, &doc).unwrap();
    assert_eq!(count(&conn, "questions"), 1);
    assert_eq!(count(&conn, "help_items"), 3);
}

#[test]
fn run_import_with_missing_document_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = ImportConfig {
        import_path: dir.path().join("imports").join("questionnaire_imports.json"),
        db_path: dir.path().join("var").join("quap.db"),
        ..ImportConfig::default()
    };

    let err = run_import(&config, FixedClock::new(1)).unwrap_err();

    assert!(err.is_source_absent());
    assert!(!config.db_path.exists());
}

#[test]
fn run_import_reads_document_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let import_path = dir.path().join("questionnaire_imports.json");
    std::fs::write(&import_path, SCENARIO).unwrap();
    let config = ImportConfig {
        import_path,
        db_path: dir.path().join("quap.db"),
        ..ImportConfig::default()
    };

    let summary = run_import(&config, FixedClock::new(1)).unwrap();
    run_import(&config, FixedClock::new(2)).unwrap();

    assert_eq!(summary.aspects.created, 1);
    let conn = Connection::open(&config.db_path).unwrap();
    assert_eq!(count(&conn, "questionnaires"), 1);
    assert_eq!(count(&conn, "questions"), 1);
}
