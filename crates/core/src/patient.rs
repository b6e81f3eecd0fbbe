//! Patient service.
//!
//! The orchestration used by the REST API and the CLI: saving documents,
//! keeping the master schema in step, computing rankings and preparing
//! annotated trees for the form. Pure data operations, no API concerns.

use crate::config::CoreConfig;
use crate::constants::{ID_KEY, PATIENT_ID_KEY};
use crate::document::Document;
use crate::flatten;
use crate::migration::{self, MigrationReport};
use crate::node::Fields;
use crate::ordering::FieldOrder;
use crate::ranking::{self, RankingOutput};
use crate::repositories::{JsonFileRepository, PatientRepository, UpsertOutcome};
use crate::schema;
use crate::tree;
use crate::{PatientError, PatientResult};
use api_shared::PatientSummary;
use chrono::Utc;
use medform_types::PatientId;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

/// Result of reordering an in-progress tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Reordered {
    /// The ranking the tree was reordered by.
    pub ranking: RankingOutput,
    /// True when no stored patient matched the tree and the global ranking was used.
    pub fell_back: bool,
}

/// Pure patient data operations - no API concerns
#[derive(Clone)]
pub struct PatientService {
    cfg: Arc<CoreConfig>,
    repo: Arc<dyn PatientRepository>,
    // Serialises save + schema merge so concurrent saves cannot drop schema paths.
    write_lock: Arc<Mutex<()>>,
}

impl PatientService {
    pub fn new(cfg: Arc<CoreConfig>, repo: Arc<dyn PatientRepository>) -> Self {
        Self {
            cfg,
            repo,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// A service over the JSON database configured in `cfg`.
    pub fn open(cfg: Arc<CoreConfig>) -> PatientResult<Self> {
        let repo = JsonFileRepository::from_config(&cfg)?;
        Ok(Self::new(cfg, Arc::new(repo)))
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    fn lock_writes(&self) -> PatientResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| PatientError::StoreUnavailable("write lock poisoned".into()))
    }

    /// Upsert a flattened patient document and fold it into the master schema.
    ///
    /// The document must be a JSON object with a non-blank string `patient_id`;
    /// it is validated before anything is written. Returns the stored document.
    pub fn save_patient(&self, body: Value) -> PatientResult<Document> {
        let Value::Object(document) = body else {
            return Err(PatientError::InvalidInput(
                "patient document must be a JSON object".into(),
            ));
        };
        let patient_id = match document.get(PATIENT_ID_KEY) {
            Some(Value::String(id)) => PatientId::parse(id.as_str())?,
            _ => {
                return Err(PatientError::InvalidInput("patient_id is required".into()));
            }
        };

        let _guard = self.lock_writes()?;
        let before = self.repo.schema()?;
        let mut master = before.clone();
        schema::merge(&mut master, &document, self.cfg.ranking());
        let fields = (master != before).then(|| schema::field_paths(&master).len());

        let outcome = self
            .repo
            .upsert_with_schema(patient_id.as_str(), document.clone(), master)?;

        if let Some(fields) = fields {
            tracing::debug!(patient_id = %patient_id, fields, "master schema grew");
        }

        match outcome {
            UpsertOutcome::Created => tracing::info!(patient_id = %patient_id, "created patient"),
            UpsertOutcome::Replaced => tracing::info!(patient_id = %patient_id, "replaced patient"),
        }
        Ok(document)
    }

    /// Flatten an annotated tree and save it.
    ///
    /// A tree with nothing ticked besides its identifiers is refused with
    /// [`PatientError::NothingToSave`] before the store is touched.
    pub fn save_draft(&self, tree: &Fields) -> PatientResult<Document> {
        let flat = flatten::flatten_for_save(tree, self.cfg.ranking())?;
        self.save_patient(Value::Object(flat))
    }

    /// `{patient_id, id}` for every stored document.
    pub fn list_patients(&self) -> PatientResult<Vec<PatientSummary>> {
        let patients = self.repo.all()?;
        let summaries = patients
            .iter()
            .filter_map(|patient| {
                let Some(patient_id) = patient.get(PATIENT_ID_KEY).and_then(Value::as_str) else {
                    tracing::warn!(
                        id = ?patient.get(ID_KEY),
                        "skipping stored patient without a string patient_id"
                    );
                    return None;
                };
                Some(PatientSummary {
                    patient_id: patient_id.to_string(),
                    id: patient
                        .get(ID_KEY)
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
            })
            .collect();
        Ok(summaries)
    }

    /// The stored (unannotated) document for `patient_id`.
    pub fn get_patient(&self, patient_id: &str) -> PatientResult<Document> {
        self.repo
            .get(patient_id)?
            .ok_or_else(|| PatientError::NotFound(patient_id.to_string()))
    }

    pub fn schema(&self) -> PatientResult<Document> {
        self.repo.schema()
    }

    pub fn global_ranking(&self) -> PatientResult<RankingOutput> {
        let patients = self.repo.all()?;
        Ok(ranking::global_ranking(&patients, self.cfg.ranking()))
    }

    /// Ranking over the patients agreeing with `context` (flat or annotated).
    ///
    /// An empty result means nothing matched.
    pub fn filtered_ranking(&self, context: &Value) -> PatientResult<RankingOutput> {
        let Value::Object(context) = context else {
            return Err(PatientError::InvalidInput(
                "filter document must be a JSON object".into(),
            ));
        };
        let patients = self.repo.all()?;
        Ok(ranking::filtered_ranking(
            &patients,
            context,
            self.cfg.ranking(),
        ))
    }

    /// The identifier the next new patient gets: `P-` and the 1-based count.
    pub fn next_patient_id(&self) -> PatientResult<PatientId> {
        let count = self.repo.all()?.len();
        Ok(PatientId::sequential(count + 1))
    }

    /// A blank annotated tree for a new patient, in global field order.
    pub fn new_patient_draft(&self) -> PatientResult<Fields> {
        let patient_id = self.next_patient_id()?;
        let id = format!("patient_{}", Utc::now().timestamp_millis());
        let master = self.repo.schema()?;
        let ranking = self.global_ranking()?;

        Ok(tree::new_patient(
            &id,
            &patient_id,
            &master,
            &FieldOrder::new(&ranking.sorted_fields),
            self.cfg.ranking(),
        ))
    }

    /// The stored document for `patient_id`, annotated for editing.
    pub fn open_patient(&self, patient_id: &str) -> PatientResult<Fields> {
        let stored = self.get_patient(patient_id)?;
        let ranking = self.global_ranking()?;
        Ok(tree::from_stored(
            &stored,
            &FieldOrder::new(&ranking.sorted_fields),
            self.cfg.ranking(),
        ))
    }

    /// Reorder `tree` by the ranking of patients similar to it.
    ///
    /// Falls back to the global ranking when no stored patient matches.
    pub fn reorder(&self, tree: &mut Fields) -> PatientResult<Reordered> {
        let context = flatten::flatten(tree);
        let patients = self.repo.all()?;
        let cfg = self.cfg.ranking();

        let filtered = ranking::filtered_ranking(&patients, &context, cfg);
        let (ranking, fell_back) = if filtered.is_empty() {
            tracing::info!("no similar patients, reordering by global frequency");
            (ranking::global_ranking(&patients, cfg), true)
        } else {
            (filtered, false)
        };

        tree::reorder(tree, &FieldOrder::new(&ranking.sorted_fields), cfg);
        Ok(Reordered { ranking, fell_back })
    }

    /// Rewrite legacy history fields of every stored patient.
    ///
    /// With `dry_run` nothing is written; the report says what would change.
    pub fn migrate_history(&self, dry_run: bool) -> PatientResult<MigrationReport> {
        let _guard = self.lock_writes()?;
        let mut patients = self.repo.all()?;
        let report = migration::migrate_all(&mut patients, self.cfg.ranking());

        if dry_run || report.patients_changed == 0 {
            return Ok(report);
        }

        let mut master = self.repo.schema()?;
        for patient in &patients {
            schema::merge(&mut master, patient, self.cfg.ranking());
        }
        self.repo.replace_all_with_schema(patients, master)?;

        tracing::info!(
            patients = report.patients_changed,
            fields = report.fields_migrated,
            "migrated legacy history fields"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankingConfig;
    use crate::node::Node;
    use crate::repositories::InMemoryRepository;
    use crate::tree::{node_at, set_value, toggle_checked};
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn test_cfg(patient_data_dir: PathBuf) -> Arc<CoreConfig> {
        Arc::new(
            CoreConfig::new(patient_data_dir, RankingConfig::default())
                .expect("CoreConfig::new should succeed"),
        )
    }

    fn memory_service() -> PatientService {
        PatientService::new(
            test_cfg(PathBuf::from("unused")),
            Arc::new(InMemoryRepository::new()),
        )
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().expect("object")
    }

    fn save(service: &PatientService, body: Value) {
        service.save_patient(body).expect("save should succeed");
    }

    /// Counts writes. `broken` fails every call; `read_only` fails only writes.
    #[derive(Default)]
    struct FlakyRepository {
        inner: InMemoryRepository,
        writes: AtomicUsize,
        broken: bool,
        read_only: bool,
    }

    impl FlakyRepository {
        fn check(&self) -> PatientResult<()> {
            if self.broken {
                return Err(PatientError::StoreUnavailable("disk on fire".into()));
            }
            Ok(())
        }

        fn check_write(&self) -> PatientResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            if self.read_only {
                return Err(PatientError::StoreUnavailable("disk full".into()));
            }
            Ok(())
        }
    }

    impl PatientRepository for FlakyRepository {
        fn all(&self) -> PatientResult<Vec<Document>> {
            self.check()?;
            self.inner.all()
        }
        fn get(&self, patient_id: &str) -> PatientResult<Option<Document>> {
            self.check()?;
            self.inner.get(patient_id)
        }
        fn upsert_with_schema(
            &self,
            patient_id: &str,
            document: Document,
            schema: Document,
        ) -> PatientResult<UpsertOutcome> {
            self.check_write()?;
            self.inner.upsert_with_schema(patient_id, document, schema)
        }
        fn replace_all_with_schema(
            &self,
            documents: Vec<Document>,
            schema: Document,
        ) -> PatientResult<()> {
            self.check_write()?;
            self.inner.replace_all_with_schema(documents, schema)
        }
        fn schema(&self) -> PatientResult<Document> {
            self.check()?;
            self.inner.schema()
        }
    }

    #[test]
    fn test_saved_fields_appear_blank_in_schema() {
        let service = memory_service();

        save(
            &service,
            json!({"patient_id": "P-001", "vitals": {"bp": {"checked": true, "value": "120/80"}}}),
        );
        let schema = service.schema().expect("schema");

        assert_eq!(Value::Object(schema)["vitals"]["bp"], json!(""));
    }

    #[test]
    fn test_save_replaces_by_patient_id_and_echoes_document() {
        let service = memory_service();

        save(&service, json!({"_id": "patient_1", "patient_id": "P-001", "temp": "38"}));
        let echoed = service
            .save_patient(json!({"_id": "patient_1", "patient_id": "P-001", "temp": "36"}))
            .expect("save should succeed");

        assert_eq!(echoed["temp"], json!("36"));
        assert_eq!(service.get_patient("P-001").expect("get")["temp"], json!("36"));
        assert_eq!(
            service.list_patients().expect("list"),
            vec![PatientSummary {
                patient_id: "P-001".into(),
                id: Some("patient_1".into())
            }]
        );
    }

    #[test]
    fn test_save_rejects_missing_patient_id_before_writing() {
        let repo = Arc::new(FlakyRepository::default());
        let service = PatientService::new(test_cfg(PathBuf::from("unused")), repo.clone());

        for body in [
            json!({"temp": "38"}),
            json!({"patient_id": "", "temp": "38"}),
            json!({"patient_id": "   "}),
            json!({"patient_id": 7}),
            json!(["not", "an", "object"]),
        ] {
            let err = service.save_patient(body).unwrap_err();
            assert!(err.is_validation(), "expected validation error, got {err:?}");
        }
        assert_eq!(repo.writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_store_failures_propagate() {
        let repo = Arc::new(FlakyRepository {
            broken: true,
            ..Default::default()
        });
        let service = PatientService::new(test_cfg(PathBuf::from("unused")), repo);

        assert!(matches!(
            service.save_patient(json!({"patient_id": "P-001", "temp": "38"})),
            Err(PatientError::StoreUnavailable(_))
        ));
        assert!(matches!(
            service.global_ranking(),
            Err(PatientError::StoreUnavailable(_))
        ));
        assert!(matches!(
            service.list_patients(),
            Err(PatientError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_failed_write_stores_neither_patient_nor_schema() {
        let repo = Arc::new(FlakyRepository {
            read_only: true,
            ..Default::default()
        });
        let service = PatientService::new(test_cfg(PathBuf::from("unused")), repo.clone());

        let err = service
            .save_patient(json!({"patient_id": "P-001", "vitals": {"bp": "120/80"}}))
            .unwrap_err();

        assert!(matches!(err, PatientError::StoreUnavailable(_)));
        assert_eq!(repo.writes.load(Ordering::SeqCst), 1);
        assert!(matches!(
            service.get_patient("P-001"),
            Err(PatientError::NotFound(_))
        ));
        assert!(service.schema().expect("schema").is_empty());
    }

    #[test]
    fn test_failed_migration_leaves_store_untouched() {
        let legacy = doc(json!({"patient_id": "P-001", "pmh": {"asthma": "1"}}));
        let repo = Arc::new(FlakyRepository {
            inner: InMemoryRepository::with_patients(vec![legacy.clone()]),
            read_only: true,
            ..Default::default()
        });
        let service = PatientService::new(test_cfg(PathBuf::from("unused")), repo);

        assert!(service.migrate_history(false).is_err());
        assert_eq!(service.get_patient("P-001").expect("get"), legacy);
        assert!(service.schema().expect("schema").is_empty());
    }

    #[test]
    fn test_list_skips_documents_without_string_patient_id() {
        let repo = InMemoryRepository::with_patients(vec![
            doc(json!({"_id": "patient_1", "patient_id": "P-001"})),
            doc(json!({"_id": "patient_2", "patient_id": 2})),
            doc(json!({"temp": "38"})),
        ]);
        let service = PatientService::new(test_cfg(PathBuf::from("unused")), Arc::new(repo));

        assert_eq!(
            service.list_patients().expect("list"),
            vec![PatientSummary {
                patient_id: "P-001".into(),
                id: Some("patient_1".into())
            }]
        );
    }

    #[test]
    fn test_get_unknown_patient_is_not_found() {
        let service = memory_service();
        assert!(matches!(
            service.get_patient("P-404"),
            Err(PatientError::NotFound(id)) if id == "P-404"
        ));
    }

    #[test]
    fn test_filtered_ranking_requires_an_object() {
        let service = memory_service();
        assert!(matches!(
            service.filtered_ranking(&json!("temp")),
            Err(PatientError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_new_patient_draft_uses_next_id_and_schema() {
        let service = memory_service();
        save(&service, json!({"patient_id": "P-001", "temp": "38", "vitals": {"bp": "1"}}));
        save(&service, json!({"patient_id": "P-002", "vitals": {"bp": "2"}}));

        let draft = service.new_patient_draft().expect("draft");

        assert_eq!(draft.get("patient_id"), Some(&Node::Verbatim(json!("P-003"))));
        let id = match draft.get("_id") {
            Some(Node::Verbatim(Value::String(id))) => id.clone(),
            other => panic!("expected string _id, got {other:?}"),
        };
        assert!(id.starts_with("patient_"));
        // vitals is filled in twice, temp once.
        assert_eq!(
            draft.keys().collect::<Vec<_>>(),
            vec!["_id", "patient_id", "vitals", "temp"]
        );
        assert_eq!(node_at(&draft, "vitals.bp"), Some(&Node::blank_leaf()));
    }

    #[test]
    fn test_draft_round_trip_through_save_and_open() {
        let service = memory_service();
        save(&service, json!({"patient_id": "P-001", "temp": "38", "note": "x"}));

        let mut draft = service.new_patient_draft().expect("draft");
        set_value(&mut draft, "temp", json!("39")).expect("set temp");
        set_value(&mut draft, "note", json!("y")).expect("set note");
        toggle_checked(&mut draft, "note").expect("untick note");

        let stored = service.save_draft(&draft).expect("save draft");
        assert_eq!(stored["patient_id"], json!("P-002"));
        assert_eq!(stored["temp"], json!("39"));
        assert!(!stored.contains_key("note"));

        let reopened = service.open_patient("P-002").expect("open");
        assert_eq!(
            node_at(&reopened, "temp"),
            Some(&Node::auto_leaf(json!("39")))
        );
    }

    #[test]
    fn test_save_draft_refuses_empty_tree() {
        let service = memory_service();
        save(&service, json!({"patient_id": "P-001", "temp": "38"}));

        let draft = service.new_patient_draft().expect("draft");

        assert!(matches!(
            service.save_draft(&draft),
            Err(PatientError::NothingToSave)
        ));
        assert_eq!(service.list_patients().expect("list").len(), 1);
    }

    #[test]
    fn test_reorder_prefers_similar_patients() {
        let service = memory_service();
        save(&service, json!({"patient_id": "P-001", "sex": "f", "pregnant": "no", "bp": "1"}));
        save(&service, json!({"patient_id": "P-002", "sex": "m", "bp": "1", "prostate": "ok"}));
        save(&service, json!({"patient_id": "P-003", "sex": "m", "prostate": "ok"}));

        let mut draft = service.new_patient_draft().expect("draft");
        set_value(&mut draft, "sex", json!("f")).expect("set sex");

        let reordered = service.reorder(&mut draft).expect("reorder");

        assert!(!reordered.fell_back);
        assert_eq!(reordered.ranking.match_count, 1);
        let keys: Vec<&str> = draft.keys().collect();
        assert_eq!(&keys[..2], ["_id", "patient_id"]);
        let pregnant = keys.iter().position(|k| *k == "pregnant").expect("pregnant");
        let prostate = keys.iter().position(|k| *k == "prostate").expect("prostate");
        assert!(pregnant < prostate);
    }

    #[test]
    fn test_reorder_falls_back_to_global_ranking() {
        let service = memory_service();
        save(&service, json!({"patient_id": "P-001", "temp": "38"}));

        let mut draft = service.new_patient_draft().expect("draft");
        set_value(&mut draft, "temp", json!("41")).expect("set temp");

        let reordered = service.reorder(&mut draft).expect("reorder");

        assert!(reordered.fell_back);
        assert_eq!(reordered.ranking.match_count, 1);
    }

    #[test]
    fn test_migrate_history_rewrites_and_extends_schema() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = PatientService::open(test_cfg(temp_dir.path().to_path_buf()))
            .expect("open should succeed");
        save(&service, json!({"patient_id": "P-001", "pmh": {"asthma": "1", "dm": "0"}}));

        let preview = service.migrate_history(true).expect("dry run");
        assert_eq!(preview.patients_changed, 1);
        assert_eq!(
            service.get_patient("P-001").expect("get")["pmh"],
            json!({"asthma": "1", "dm": "0"})
        );

        service.migrate_history(false).expect("migrate");
        assert_eq!(
            service.get_patient("P-001").expect("get")["pmh"],
            json!({"positive": ["asthma"], "negative": ["dm"]})
        );
        let schema = Value::Object(service.schema().expect("schema"));
        assert_eq!(schema["pmh"]["positive"], json!(""));
        assert_eq!(schema["pmh"]["asthma"], json!(""));
    }
}
