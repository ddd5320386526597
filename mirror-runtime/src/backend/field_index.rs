//! Full-text field-index backend: a [`tantivy`] index mapping synthetic
//! document IDs to `{kind, namespace, name, version, modified}` tuples,
//! paired with an object cache keyed by the same ID.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use mirror_core::{MirrorError, Object};
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, RegexQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, SchemaBuilder, Value, FAST, STORED, STRING};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use uuid::Uuid;

use super::{MirrorBackend, Scope};
use crate::metrics::MirrorMetrics;

const MAX_UID_ATTEMPTS: u32 = 5;
const WRITER_BUDGET_BYTES: usize = 15_000_000;

fn segment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-*]*$").expect("static regex"))
}

#[derive(Clone, Copy)]
struct Fields {
    uid: Field,
    kind: Field,
    namespace: Field,
    name: Field,
    version: Field,
    modified: Field,
}

fn build_schema() -> (Schema, Fields) {
    let mut builder = SchemaBuilder::new();
    let uid = builder.add_text_field("uid", STRING | STORED);
    let kind = builder.add_text_field("kind", STRING | STORED);
    let namespace = builder.add_text_field("namespace", STRING | STORED);
    let name = builder.add_text_field("name", STRING | STORED);
    let version = builder.add_text_field("version", STRING | STORED);
    let modified = builder.add_i64_field("modified", STORED | FAST);
    let schema = builder.build();
    (
        schema,
        Fields {
            uid,
            kind,
            namespace,
            name,
            version,
            modified,
        },
    )
}

/// A parsed form of the query-string grammar, shared by the raw
/// `Search`/`DeleteByQuery` entry points and the structured `Scope`-based
/// operations the query builder drives.
#[derive(Debug, Default, Clone)]
struct ParsedQuery {
    kind: Option<String>,
    namespace: Option<String>,
    name: Option<String>,
    version: Option<String>,
    modified_after: Option<i64>,
}

fn validate_value(field: &'static str, value: &str) -> Result<String, MirrorError> {
    if segment_regex().is_match(value) {
        Ok(value.to_string())
    } else {
        Err(MirrorError::InvalidQuery {
            field,
            reason: format!("segment {value:?} contains characters outside [A-Za-z0-9_*-]"),
        })
    }
}

/// Parse `"+kind:pod +namespace:default +modified:>1700000000"` into a
/// [`ParsedQuery`]. `kind` is mandatory; everything else is optional.
fn parse_query_string(query: &str) -> Result<ParsedQuery, MirrorError> {
    let mut parsed = ParsedQuery::default();
    for term in query.split_whitespace() {
        let rest = term.strip_prefix('+').ok_or_else(|| MirrorError::InvalidQuery {
            field: "query",
            reason: format!("term {term:?} must be prefixed with '+'"),
        })?;
        let (field, value) = rest.split_once(':').ok_or_else(|| MirrorError::InvalidQuery {
            field: "query",
            reason: format!("term {term:?} is missing a ':'"),
        })?;
        match field {
            "kind" => parsed.kind = Some(validate_value("kind", value)?),
            "namespace" => parsed.namespace = Some(validate_value("namespace", value)?),
            "name" => parsed.name = Some(validate_value("name", value)?),
            "version" => parsed.version = Some(validate_value("version", value)?),
            "modified" => {
                let threshold = value.strip_prefix('>').ok_or_else(|| MirrorError::InvalidQuery {
                    field: "modified",
                    reason: "modified constraint must be of the form '>TIMESTAMP'".to_string(),
                })?;
                let threshold = threshold.parse::<i64>().map_err(|_| MirrorError::InvalidQuery {
                    field: "modified",
                    reason: format!("{threshold:?} is not a unix timestamp"),
                })?;
                parsed.modified_after = Some(threshold);
            }
            other => {
                return Err(MirrorError::InvalidQuery {
                    field: "query",
                    reason: format!("unknown field {other:?}"),
                })
            }
        }
    }
    if parsed.kind.is_none() {
        return Err(MirrorError::InvalidQuery {
            field: "kind",
            reason: "kind is mandatory in every query".to_string(),
        });
    }
    Ok(parsed)
}

fn term_query(field: Field, value: &str) -> Box<dyn Query> {
    if value.contains('*') {
        let pattern = format!("^{}$", value.replace('*', ".*"));
        Box::new(RegexQuery::from_pattern(&pattern, field).expect("glob pattern is valid regex"))
    } else {
        Box::new(TermQuery::new(Term::from_field_text(field, value), IndexRecordOption::Basic))
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn modified_floor(scope: &Scope) -> Option<i64> {
    scope.within.map(|within| now_secs() - within.as_secs() as i64)
}

fn require_kind(scope: &Scope) -> Result<String, MirrorError> {
    scope.kind.clone().ok_or(MirrorError::InvalidQuery {
        field: "kind",
        reason: "kind is required for field-index queries".to_string(),
    })
}

/// The field-index mirror backend.
pub struct FieldIndexBackend<K> {
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: Fields,
    cache: RwLock<HashMap<String, K>>,
    metrics: Arc<dyn MirrorMetrics>,
}

impl<K> FieldIndexBackend<K> {
    /// Build an empty in-memory index.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::BackendFailure`] if tantivy fails to
    /// construct the index or its writer.
    pub fn new(metrics: Arc<dyn MirrorMetrics>) -> Result<Self, MirrorError> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        let writer = index
            .writer(WRITER_BUDGET_BYTES)
            .map_err(|e| MirrorError::BackendFailure(e.to_string()))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e: tantivy::TantivyError| MirrorError::BackendFailure(e.to_string()))?;
        Ok(Self {
            reader,
            writer: Mutex::new(writer),
            fields,
            cache: RwLock::new(HashMap::new()),
            metrics,
        })
    }

    fn compile(&self, parsed: &ParsedQuery) -> Result<Box<dyn Query>, MirrorError> {
        let kind = parsed.kind.as_deref().ok_or(MirrorError::InvalidQuery {
            field: "kind",
            reason: "kind is mandatory in every query".to_string(),
        })?;
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, term_query(self.fields.kind, kind))];
        if let Some(ns) = &parsed.namespace {
            clauses.push((Occur::Must, term_query(self.fields.namespace, ns)));
        }
        if let Some(name) = &parsed.name {
            clauses.push((Occur::Must, term_query(self.fields.name, name)));
        }
        if let Some(version) = &parsed.version {
            clauses.push((Occur::Must, term_query(self.fields.version, version)));
        }
        Ok(Box::new(BooleanQuery::new(clauses)))
    }

    /// Run `parsed` against the index and return the matching document UIDs.
    fn search_uids(&self, parsed: &ParsedQuery) -> Result<Vec<String>, MirrorError> {
        let query = self.compile(parsed)?;
        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(searcher.num_docs() as usize + 1))
            .map_err(|e| MirrorError::BackendFailure(e.to_string()))?;
        let mut uids = Vec::with_capacity(top_docs.len());
        for (_score, addr) in top_docs {
            let retrieved: TantivyDocument = searcher
                .doc(addr)
                .map_err(|e| MirrorError::BackendFailure(e.to_string()))?;
            if let Some(floor) = parsed.modified_after {
                let modified = retrieved
                    .get_first(self.fields.modified)
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                if modified <= floor {
                    continue;
                }
            }
            let uid = retrieved
                .get_first(self.fields.uid)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            uids.push(uid);
        }
        Ok(uids)
    }

    fn mint_uid(&self) -> Result<String, MirrorError> {
        let cache = self.cache.read();
        for _ in 0..MAX_UID_ATTEMPTS {
            let candidate = Uuid::new_v4().to_string();
            if !cache.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(MirrorError::UIDExhaustion {
            attempts: MAX_UID_ATTEMPTS,
        })
    }

    fn commit(&self, writer: &mut IndexWriter) -> Result<(), MirrorError> {
        writer.commit().map_err(|e| MirrorError::BackendFailure(e.to_string()))?;
        self.reader.reload().map_err(|e| MirrorError::BackendFailure(e.to_string()))
    }

    /// Run a raw `+field:value` query string and return the matching
    /// document UIDs, without touching the object cache.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::InvalidQuery`] if the grammar is malformed or
    /// `kind` is absent.
    pub fn search(&self, query: &str) -> Result<Vec<String>, MirrorError> {
        let started = Instant::now();
        let parsed = parse_query_string(query)?;
        let result = self.search_uids(&parsed);
        self.metrics.record(
            "field.search",
            parsed.kind.as_deref().unwrap_or("-"),
            result.is_ok(),
            started.elapsed(),
        );
        result
    }

    /// Delete every document matching a raw query string. Returns how many
    /// documents were removed.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::InvalidQuery`] if the grammar is malformed or
    /// `kind` is absent; [`MirrorError::BackendFailure`] on an internal
    /// tantivy error.
    pub fn delete_by_query(&self, query: &str) -> Result<usize, MirrorError> {
        let started = Instant::now();
        let parsed = parse_query_string(query)?;
        let hits = self.search_uids(&parsed)?;
        if hits.is_empty() {
            self.metrics
                .record("field.delete_by_query", parsed.kind.as_deref().unwrap_or("-"), true, started.elapsed());
            return Ok(0);
        }
        let mut writer = self.writer.lock();
        for uid in &hits {
            writer.delete_term(Term::from_field_text(self.fields.uid, uid));
        }
        self.commit(&mut writer)?;
        drop(writer);
        let mut cache = self.cache.write();
        for uid in &hits {
            cache.remove(uid);
        }
        self.metrics
            .record("field.delete_by_query", parsed.kind.as_deref().unwrap_or("-"), true, started.elapsed());
        Ok(hits.len())
    }
}

impl<K: Object> MirrorBackend<K> for FieldIndexBackend<K> {
    fn validate_segment(&self, field: &'static str, value: &str) -> Result<(), MirrorError> {
        validate_value(field, value).map(|_| ())
    }

    fn requires_kind_for_list(&self) -> bool {
        true
    }

    fn get(&self, scope: &Scope, name: &str) -> Result<Option<K>, MirrorError> {
        let started = Instant::now();
        let kind = require_kind(scope)?;
        let parsed = ParsedQuery {
            kind: Some(kind.clone()),
            namespace: scope.namespace.clone(),
            name: Some(name.to_string()),
            version: scope.version.clone(),
            modified_after: modified_floor(scope),
        };
        let hits = self.search_uids(&parsed)?;
        let result = match hits.len() {
            0 => Ok(None),
            1 => Ok(self.cache.read().get(&hits[0]).cloned()),
            count => Err(MirrorError::AmbiguousResult { count }),
        };
        self.metrics.record("field.get", &kind, result.is_ok(), started.elapsed());
        result
    }

    fn set(&self, scope: &Scope, name: &str, object: K) -> Result<(), MirrorError> {
        let started = Instant::now();
        let kind = require_kind(scope)?;
        let identity = ParsedQuery {
            kind: Some(kind.clone()),
            namespace: scope.namespace.clone(),
            name: Some(name.to_string()),
            version: None,
            modified_after: None,
        };

        // The identity search and the mint-or-reuse decision it feeds must be
        // atomic with the write that follows: otherwise two concurrent `set`s
        // for the same identity can both observe zero hits, each mint a
        // distinct UID, and both land as separate live documents. Holding the
        // writer lock across the whole find-or-mint-or-reject sequence is
        // what gives this backend the same per-identity serialization the
        // path-index backend gets for free from its single tree lock.
        let mut writer = self.writer.lock();
        let hits = self.search_uids(&identity)?;
        let uid = match hits.len() {
            0 => self.mint_uid()?,
            1 => hits[0].clone(),
            count => return Err(MirrorError::AmbiguousUpdate { count }),
        };

        let namespace = scope
            .namespace
            .clone()
            .or_else(|| object.namespace().map(str::to_string))
            .unwrap_or_default();
        let version = object.resource_version().to_string();
        let modified = now_secs();

        writer.delete_term(Term::from_field_text(self.fields.uid, &uid));
        let tdoc = doc!(
            self.fields.uid => uid.clone(),
            self.fields.kind => kind.clone(),
            self.fields.namespace => namespace,
            self.fields.name => name.to_string(),
            self.fields.version => version,
            self.fields.modified => modified,
        );
        writer
            .add_document(tdoc)
            .map_err(|e| MirrorError::BackendFailure(e.to_string()))?;
        self.commit(&mut writer)?;
        drop(writer);

        self.cache.write().insert(uid, object);
        self.metrics.record("field.set", &kind, true, started.elapsed());
        Ok(())
    }

    fn delete(&self, scope: &Scope, name: &str) -> Result<bool, MirrorError> {
        let started = Instant::now();
        let kind = require_kind(scope)?;
        let parsed = ParsedQuery {
            kind: Some(kind.clone()),
            namespace: scope.namespace.clone(),
            name: Some(name.to_string()),
            version: None,
            modified_after: None,
        };
        let hits = self.search_uids(&parsed)?;
        if hits.is_empty() {
            self.metrics.record("field.delete", &kind, true, started.elapsed());
            return Ok(false);
        }
        let mut writer = self.writer.lock();
        for uid in &hits {
            writer.delete_term(Term::from_field_text(self.fields.uid, uid));
        }
        self.commit(&mut writer)?;
        drop(writer);
        let mut cache = self.cache.write();
        for uid in &hits {
            cache.remove(uid);
        }
        self.metrics.record("field.delete", &kind, true, started.elapsed());
        Ok(true)
    }

    fn list(&self, scope: &Scope) -> Result<Vec<K>, MirrorError> {
        let started = Instant::now();
        let kind = require_kind(scope)?;
        let parsed = ParsedQuery {
            kind: Some(kind.clone()),
            namespace: scope.namespace.clone(),
            name: None,
            version: scope.version.clone(),
            modified_after: modified_floor(scope),
        };
        let hits = self.search_uids(&parsed)?;
        let cache = self.cache.read();
        let mut objects = Vec::with_capacity(hits.len());
        for uid in &hits {
            match cache.get(uid) {
                Some(obj) => objects.push(obj.clone()),
                None => tracing::warn!(uid, kind = %kind, "indexed document has no matching cache entry"),
            }
        }
        self.metrics.record("field.list", &kind, true, started.elapsed());
        Ok(objects)
    }
}
