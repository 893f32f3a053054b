//! Batch source: page through a [`PageFetcher`] and emit flattened batches.
//!
//! For every page in `0..page_count`, in order, the source fetches the raw
//! payload, keeps only the top-level keys its [`SchemaFilter`] selects,
//! flattens each kept value under its key, and yields the page's records as
//! one [`Batch`].
//!
//! The sequence is a lazy [`Stream`]: nothing is fetched until the consumer
//! polls, one page is in flight at a time, and dropping the stream abandons
//! whatever is left. A fetch error ends the stream after being yielded.

use crate::error::FetchError;
use crate::fetcher::PageFetcher;
use crate::flatten::flatten_into;
use crate::models::{Batch, FlatRecord, PageIndex, RawRecord, result_items};
use crate::schema::SchemaFilter;
use futures::stream::{self, Stream};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Position of a [`BatchSource`] in its page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Page `next` is still to be fetched.
    Active { next: PageIndex },
    /// Every page in range has been handed out.
    Exhausted,
}

/// Hands out page indices `0..page_count` exactly once, in increasing order.
#[derive(Debug, Clone)]
pub struct PageCursor {
    next: PageIndex,
    page_count: PageIndex,
}

impl PageCursor {
    pub fn new(page_count: PageIndex) -> Self {
        PageCursor { next: 0, page_count }
    }

    pub fn state(&self) -> CursorState {
        if self.next < self.page_count {
            CursorState::Active { next: self.next }
        } else {
            CursorState::Exhausted
        }
    }

    /// Claim the next page, or `None` once exhausted.
    pub fn advance(&mut self) -> Option<PageIndex> {
        match self.state() {
            CursorState::Active { next } => {
                self.next += 1;
                Some(next)
            }
            CursorState::Exhausted => None,
        }
    }
}

/// Turns pages from a [`PageFetcher`] into schema-filtered, flattened batches.
#[derive(Debug)]
pub struct BatchSource<F> {
    fetcher: F,
    filter: SchemaFilter,
}

impl<F> BatchSource<F>
where
    F: PageFetcher,
{
    pub fn new(fetcher: F, filter: SchemaFilter) -> Self {
        BatchSource { fetcher, filter }
    }

    pub fn filter(&self) -> &SchemaFilter {
        &self.filter
    }

    /// The output schema's field names.
    pub fn fields(&self) -> &[String] {
        self.filter.fields()
    }

    /// Record incremental-load hints. Pages are always read from the start;
    /// the hints are only logged.
    pub fn connect(&mut self, inc_column: Option<&str>, max_inc_value: Option<&str>) {
        debug!(?inc_column, "Incremental column");
        debug!(?max_inc_value, "Incremental last value");
    }

    /// Release the source. There is no connection state to tear down.
    ///
    /// [`BatchSource::produce_batches`] calls this once the page range is
    /// exhausted; a stream that ends on a fetch error or is dropped early
    /// never reaches it.
    pub fn disconnect(&mut self) {
        debug!("Source disconnected");
    }

    /// Flatten one raw item, keeping only schema-selected top-level keys.
    ///
    /// Keys are merged in document order, so when two selected keys flatten
    /// to the same dotted path the one appearing later in the item wins.
    ///
    /// An item that is not a mapping has no selectable keys and produces an
    /// empty record.
    pub fn flatten_item(&self, item: &RawRecord) -> FlatRecord {
        let mut record = FlatRecord::new();
        match item {
            Value::Object(fields) => {
                for (key, value) in fields {
                    if self.filter.is_selected(key) {
                        flatten_into(key, value, &mut record);
                    }
                }
            }
            other => {
                warn!(
                    kind = value_kind(other),
                    "Result item is not an object; emitting empty record"
                );
            }
        }
        record
    }

    /// Build the batch for one raw page payload, preserving item order.
    pub fn build_batch(&self, payload: &Value) -> Batch {
        result_items(payload)
            .iter()
            .map(|item| self.flatten_item(item))
            .collect()
    }

    #[instrument(level = "info", skip_all, fields(page = page))]
    async fn next_batch(&self, page: PageIndex) -> Result<Batch, FetchError> {
        let payload = self.fetcher.fetch_page(page).await?;
        let batch = self.build_batch(&payload);
        info!(records = batch.len(), "Built batch");
        Ok(batch)
    }

    /// Lazily produce one batch per page in `0..page_count`.
    ///
    /// The stream yields exactly `page_count` batches on success. If a fetch
    /// fails, the error is yielded in place of that page's batch and the
    /// stream ends; later pages are never requested. The source is consumed,
    /// so starting over means building a new one.
    pub fn produce_batches(
        self,
        page_count: PageIndex,
    ) -> impl Stream<Item = Result<Batch, FetchError>> {
        info!(page_count, fields = self.filter.fields().len(), "Producing batches");
        stream::try_unfold(
            (self, PageCursor::new(page_count)),
            |(mut source, mut cursor)| async move {
                let Some(page) = cursor.advance() else {
                    debug!("Page range exhausted");
                    source.disconnect();
                    return Ok(None);
                };
                let batch = source.next_batch(page).await?;
                Ok(Some((batch, (source, cursor))))
            },
        )
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use futures::StreamExt;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// Serves canned payloads and fails on one chosen page. `calls` is shared
    /// so it can be read after the source has been consumed.
    #[derive(Debug, Default)]
    struct ScriptedFetcher {
        pages: HashMap<PageIndex, Value>,
        fail_on: Option<PageIndex>,
        calls: Rc<RefCell<Vec<PageIndex>>>,
    }

    impl ScriptedFetcher {
        fn call_log(&self) -> Rc<RefCell<Vec<PageIndex>>> {
            Rc::clone(&self.calls)
        }

        fn with_page(mut self, page: PageIndex, payload: Value) -> Self {
            self.pages.insert(page, payload);
            self
        }

        fn failing_on(mut self, page: PageIndex) -> Self {
            self.fail_on = Some(page);
            self
        }
    }

    impl PageFetcher for ScriptedFetcher {
        async fn fetch_page(&self, page: PageIndex) -> Result<Value, FetchError> {
            self.calls.borrow_mut().push(page);
            if self.fail_on == Some(page) {
                return Err(FetchError::Status { page, status: 503 });
            }
            Ok(self.pages.get(&page).cloned().unwrap_or_else(|| json!({})))
        }
    }

    fn docs(items: Vec<Value>) -> Value {
        json!({"status": "OK", "response": {"docs": items, "meta": {"hits": 0}}})
    }

    fn source_with(fetcher: ScriptedFetcher, fields: &[&str]) -> BatchSource<ScriptedFetcher> {
        BatchSource::new(fetcher, SchemaFilter::new(Schema::new(fields.iter().copied())))
    }

    #[test]
    fn test_cursor_states() {
        let mut cursor = PageCursor::new(2);
        assert_eq!(cursor.state(), CursorState::Active { next: 0 });
        assert_eq!(cursor.advance(), Some(0));
        assert_eq!(cursor.advance(), Some(1));
        assert_eq!(cursor.state(), CursorState::Exhausted);
        assert_eq!(cursor.advance(), None);
        assert_eq!(cursor.advance(), None);

        let mut empty = PageCursor::new(0);
        assert_eq!(empty.state(), CursorState::Exhausted);
        assert_eq!(empty.advance(), None);
    }

    #[test]
    fn test_flatten_item_selects_schema_keys() {
        let source = source_with(ScriptedFetcher::default(), &["_id", "headline"]);
        let item = json!({
            "_id": "X1",
            "headline": {"main": "Title", "kicker": null},
            "ignored": "y"
        });

        let record = source.flatten_item(&item);

        let expected = json!({"_id": "X1", "headline.main": "Title", "headline.kicker": null});
        assert_eq!(Value::Object(record), expected);
    }

    #[test]
    fn test_flatten_item_excludes_unselected_subtrees() {
        let source = source_with(ScriptedFetcher::default(), &["headline"]);
        let item = json!({
            "headline": {"main": "Title"},
            "byline": {"original": "By Someone", "person": [{"firstname": "Some"}]},
            "keywords": [{"name": "subject", "value": "Technology"}]
        });

        let record = source.flatten_item(&item);
        assert_eq!(record.len(), 1);
        assert!(record.keys().all(|k| k == "headline" || k.starts_with("headline.")));
    }

    #[test]
    fn test_flatten_item_scalar_field_keeps_its_name() {
        let source = source_with(ScriptedFetcher::default(), &["word_count", "multimedia"]);
        let item = json!({"word_count": 1200, "multimedia": [{"url": "a.jpg"}]});

        let record = source.flatten_item(&item);
        assert_eq!(record["word_count"], 1200);
        assert_eq!(record["multimedia"], json!([{"url": "a.jpg"}]));
    }

    #[test]
    fn test_flatten_item_collision_follows_document_order() {
        let source = source_with(ScriptedFetcher::default(), &["a", "a.b"]);

        let item: Value = serde_json::from_str(r#"{"a.b": 2, "a": {"b": 1}}"#).unwrap();
        let record = source.flatten_item(&item);
        assert_eq!(record.len(), 1);
        assert_eq!(record["a.b"], 1);

        let item: Value = serde_json::from_str(r#"{"a": {"b": 1}, "a.b": 2}"#).unwrap();
        let record = source.flatten_item(&item);
        assert_eq!(record.len(), 1);
        assert_eq!(record["a.b"], 2);
    }

    #[test]
    fn test_flatten_item_keeps_document_key_order() {
        let source = source_with(ScriptedFetcher::default(), &["_id", "headline", "abstract"]);
        let item: Value = serde_json::from_str(
            r#"{"headline": {"main": "T", "kicker": null}, "_id": "X1", "abstract": "A"}"#,
        )
        .unwrap();

        let record = source.flatten_item(&item);
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, ["headline.main", "headline.kicker", "_id", "abstract"]);
    }

    #[test]
    fn test_flatten_item_non_object_is_empty() {
        let source = source_with(ScriptedFetcher::default(), &["_id"]);
        assert!(source.flatten_item(&json!("just a string")).is_empty());
        assert!(source.flatten_item(&json!(null)).is_empty());
    }

    #[test]
    fn test_items_flatten_independently() {
        let source = source_with(ScriptedFetcher::default(), &["headline"]);
        let payload = docs(vec![
            json!({"headline": {"main": "A"}}),
            json!({"headline": "plain"}),
        ]);

        let batch = source.build_batch(&payload);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0]["headline.main"], "A");
        assert!(!batch[0].contains_key("headline"));
        assert_eq!(batch[1]["headline"], "plain");
        assert!(!batch[1].contains_key("headline.main"));
    }

    #[test]
    fn test_build_batch_missing_container_is_empty() {
        let source = source_with(ScriptedFetcher::default(), &["_id"]);
        assert!(source.build_batch(&json!({"fault": "quota"})).is_empty());
    }

    #[tokio::test]
    async fn test_batch_count_matches_pages() {
        for n in [0u32, 1, 3, 7] {
            let source = source_with(ScriptedFetcher::default(), &["_id"]);
            let batches: Vec<_> = source.produce_batches(n).collect().await;
            assert_eq!(batches.len(), n as usize);
            assert!(batches.iter().all(|b| matches!(b, Ok(batch) if batch.is_empty())));
        }
    }

    #[tokio::test]
    async fn test_zero_pages_never_fetches() {
        let fetcher = ScriptedFetcher::default();
        let calls = fetcher.call_log();
        let source = source_with(fetcher, &["_id"]);

        let stream = source.produce_batches(0);
        futures::pin_mut!(stream);
        assert!(stream.next().await.is_none());
        assert!(calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_one_record_then_empty_page() {
        let fetcher = ScriptedFetcher::default()
            .with_page(0, docs(vec![json!({"_id": "X1", "headline": {"main": "Title"}})]))
            .with_page(1, docs(vec![]));
        let source = source_with(fetcher, &["_id", "headline"]);

        let batches: Vec<Batch> = source
            .produce_batches(2)
            .map(|b| b.unwrap())
            .collect()
            .await;

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0]["_id"], "X1");
        assert_eq!(batches[0][0]["headline.main"], "Title");
        assert!(batches[1].is_empty());
    }

    #[tokio::test]
    async fn test_record_order_follows_page_order() {
        let items: Vec<Value> = (0..5).map(|i| json!({"_id": format!("id-{i}")})).collect();
        let fetcher = ScriptedFetcher::default().with_page(0, docs(items));
        let source = source_with(fetcher, &["_id"]);

        let stream = source.produce_batches(1);
        futures::pin_mut!(stream);
        let batch = stream.next().await.unwrap().unwrap();

        let ids: Vec<&str> = batch.iter().map(|r| r["_id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["id-0", "id-1", "id-2", "id-3", "id-4"]);
    }

    #[tokio::test]
    async fn test_failure_stops_iteration() {
        let fetcher = ScriptedFetcher::default()
            .with_page(0, docs(vec![json!({"_id": "first"})]))
            .with_page(2, docs(vec![json!({"_id": "never"})]))
            .failing_on(1);
        let calls = fetcher.call_log();
        let source = source_with(fetcher, &["_id"]);

        let results: Vec<Result<Batch, FetchError>> = source.produce_batches(3).collect().await;

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first[0]["_id"], "first");
        assert!(matches!(results[1], Err(FetchError::Status { page: 1, status: 503 })));
        assert_eq!(*calls.borrow(), [0, 1]);
    }

    #[tokio::test]
    async fn test_pages_fetched_in_order_and_once() {
        let fetcher = ScriptedFetcher::default();
        let calls = fetcher.call_log();
        let source = source_with(fetcher, &["_id"]);

        let batches: Vec<_> = source.produce_batches(4).collect().await;
        assert_eq!(batches.len(), 4);
        assert_eq!(*calls.borrow(), [0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_partial_consumption_is_lazy() {
        let fetcher = ScriptedFetcher::default()
            .with_page(0, docs(vec![json!({"_id": "a"})]))
            .with_page(1, docs(vec![json!({"_id": "b"})]));
        let calls = fetcher.call_log();
        let source = source_with(fetcher, &["_id"]);

        let taken: Vec<_> = source.produce_batches(10).take(2).collect().await;
        assert_eq!(taken.len(), 2);
        assert_eq!(*calls.borrow(), [0, 1]);
    }

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    async fn run_and_capture(source: BatchSource<ScriptedFetcher>, pages: PageIndex) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let _: Vec<_> = source.produce_batches(pages).collect().await;
        logs.contents()
    }

    #[tokio::test]
    async fn test_exhausted_stream_disconnects() {
        let source = source_with(ScriptedFetcher::default(), &["_id"]);
        let logs = run_and_capture(source, 2).await;
        assert!(logs.contains("Page range exhausted"));
        assert!(logs.contains("Source disconnected"));
    }

    #[tokio::test]
    async fn test_failed_stream_does_not_disconnect() {
        let source = source_with(ScriptedFetcher::default().failing_on(0), &["_id"]);
        let logs = run_and_capture(source, 2).await;
        assert!(!logs.contains("Source disconnected"));
    }

    #[test]
    fn test_connect_and_fields() {
        let mut source = source_with(ScriptedFetcher::default(), &["_id", "uri"]);
        source.connect(Some("pub_date"), Some("2024-01-01"));
        assert_eq!(source.fields(), ["_id", "uri"]);
        assert!(source.filter().is_selected("uri"));
        source.disconnect();
    }
}
