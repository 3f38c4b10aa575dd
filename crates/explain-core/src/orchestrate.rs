//! Request orchestration: validate → parse → (retrieve ∥ collect) →
//! generate, with the trace cache and the error taxonomy in between.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Instant;

use explain_ai::{ChatMessage, LlmClient, SearchClient};
use explain_db::queries::{pages, products};
use explain_db::{DbPool, Tenant};
use explain_redis::{origins, trace_cache, KvPool};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::component;
use crate::config::ServiceConfig;
use crate::error::{ExplainError, ExplainResult};
use crate::generate::{self, CollectedData};
use crate::handles;
use crate::history;
use crate::import;
use crate::intent::{self, ParsedIntent, QuestionDomain};
use crate::retrieval;
use crate::schema;
use crate::tenant as tenant_router;
use crate::trace::{self, TraceStep, TraceStepName};

/// How many entries a product-name lookup may resolve to.
const NAME_RESOLUTION_CAP: usize = 5;

/// Steps whose `productIds` is the surviving product set; on a trace
/// cache hit their target predicate is re-derived for this request's
/// targets.
const PRODUCT_SET_STEPS: &[TraceStepName] = &[
    TraceStepName::RegionToProducts,
    TraceStepName::MainQuery,
    TraceStepName::MergeExplicit,
    TraceStepName::ApplyExcludes,
    TraceStepName::Sort,
    TraceStepName::Limit,
];

/// A validated explain request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    pub question: String,
    pub tenant: Option<String>,
    pub hostname: Option<String>,
    pub page_uri: Option<String>,
    pub component_index: Option<usize>,
    pub history: Option<Vec<Value>>,
}

/// Wall-clock stage timings, in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    pub parse_ms: u64,
    pub collect_ms: u64,
    pub retrieval_ms: u64,
    pub generation_ms: u64,
    pub total_ms: u64,
}

/// Debug payload attached to every response.
#[derive(Debug, Clone, Serialize)]
pub struct DebugInfo {
    pub intent: ParsedIntent,
    pub timing: Timing,
}

/// The buffered response shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainResponse {
    pub explanation: String,
    pub trace: Vec<TraceStep>,
    pub config: Value,
    pub debug: DebugInfo,
}

/// One frame of the streaming response.
#[derive(Debug, Clone)]
pub enum SseFrame {
    Metadata(Value),
    Content(String),
    Done,
    Error(String),
}

/// The cached `{config, trace}` snapshot for a component fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedTrace {
    config: component::ComponentConfig,
    trace: Vec<TraceStep>,
}

struct CollectOutcome {
    data: CollectedData,
    targets: Vec<i64>,
    cache_hit: bool,
}

struct RequestContext {
    tenant: Tenant,
    intent: ParsedIntent,
    chat_history: Vec<ChatMessage>,
    component_index: usize,
    parse_ms: u64,
}

/// Validate a raw JSON body into an [`ExplainRequest`].
pub fn validate_request(body: &Value) -> ExplainResult<ExplainRequest> {
    let obj = body
        .as_object()
        .ok_or_else(|| ExplainError::bad_request("body must be a JSON object"))?;

    let question = obj
        .get("question")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ExplainError::bad_request("question must be a non-empty string"))?;

    let string_field = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

    Ok(ExplainRequest {
        question: question.to_string(),
        tenant: string_field("tenant"),
        hostname: string_field("hostname"),
        page_uri: string_field("pageUri"),
        component_index: obj
            .get("componentIndex")
            .and_then(Value::as_u64)
            .map(|n| n as usize),
        history: obj.get("history").and_then(Value::as_array).cloned(),
    })
}

/// The explanation service: owns the shared pools and clients.
pub struct ExplainService {
    db: DbPool,
    kv: KvPool,
    llm: LlmClient,
    search: SearchClient,
    config: ServiceConfig,
    attached: Mutex<HashSet<String>>,
}

impl ExplainService {
    pub fn new(
        db: DbPool,
        kv: KvPool,
        llm: LlmClient,
        search: SearchClient,
        config: ServiceConfig,
    ) -> Self {
        Self {
            db,
            kv,
            llm,
            search,
            config,
            attached: Mutex::new(HashSet::new()),
        }
    }

    pub fn environment(&self) -> &str {
        &self.config.environment
    }

    /// Answer an explain request, buffered.
    pub async fn explain(&self, request: ExplainRequest) -> ExplainResult<ExplainResponse> {
        let started = Instant::now();
        let ctx = self.prepare(&request).await?;

        // Code retrieval runs concurrently with the database work.
        let retrieval_task = async {
            let t = Instant::now();
            let context =
                retrieval::retrieve_context(&self.search, &ctx.intent, Some(&ctx.tenant)).await;
            (context, elapsed_ms(t))
        };
        let collect_task = async {
            let t = Instant::now();
            let outcome = self
                .collect(&ctx.tenant, &ctx.intent, ctx.component_index)
                .await;
            (outcome, elapsed_ms(t))
        };
        let ((code_context, retrieval_ms), (outcome, collect_ms)) =
            tokio::join!(retrieval_task, collect_task);
        let outcome = outcome?;

        let generation_started = Instant::now();
        let explanation = generate::generate(
            &self.llm,
            &ctx.intent,
            &outcome.data,
            &outcome.targets,
            &code_context,
            &ctx.chat_history,
        )
        .await;
        let generation_ms = elapsed_ms(generation_started).max(1);

        info!(
            tenant = %ctx.tenant,
            domain = ?ctx.intent.domain,
            cache_hit = outcome.cache_hit,
            "Explain request served"
        );

        Ok(ExplainResponse {
            explanation,
            trace: outcome.data.trace().to_vec(),
            config: outcome.data.config_json(),
            debug: DebugInfo {
                intent: ctx.intent,
                timing: Timing {
                    parse_ms: ctx.parse_ms,
                    collect_ms,
                    retrieval_ms,
                    generation_ms,
                    total_ms: elapsed_ms(started),
                },
            },
        })
    }

    /// Answer an explain request as a frame stream: exactly one metadata
    /// frame, content frames, then `done` (or `error` in its place).
    pub async fn explain_stream(
        &self,
        request: ExplainRequest,
    ) -> ExplainResult<BoxStream<'static, SseFrame>> {
        let started = Instant::now();
        let ctx = self.prepare(&request).await?;

        let retrieval_task = async {
            let t = Instant::now();
            let context =
                retrieval::retrieve_context(&self.search, &ctx.intent, Some(&ctx.tenant)).await;
            (context, elapsed_ms(t))
        };
        let collect_task = async {
            let t = Instant::now();
            let outcome = self
                .collect(&ctx.tenant, &ctx.intent, ctx.component_index)
                .await;
            (outcome, elapsed_ms(t))
        };
        let ((code_context, retrieval_ms), (outcome, collect_ms)) =
            tokio::join!(retrieval_task, collect_task);
        let outcome = outcome?;

        let metadata = json!({
            "trace": outcome.data.trace(),
            "config": outcome.data.config_json(),
            "debug": DebugInfo {
                intent: ctx.intent.clone(),
                timing: Timing {
                    parse_ms: ctx.parse_ms,
                    collect_ms,
                    retrieval_ms,
                    generation_ms: 0,
                    total_ms: elapsed_ms(started),
                },
            },
        });

        let content = generate::generate_stream(
            &self.llm,
            &ctx.intent,
            &outcome.data,
            &outcome.targets,
            &code_context,
            &ctx.chat_history,
        )
        .await;

        let body = content
            .map(|chunk| match chunk {
                Ok(text) => SseFrame::Content(text),
                Err(e) => SseFrame::Error(e.to_string()),
            })
            .chain(futures::stream::once(async { SseFrame::Done }));

        // An error frame terminates the stream; `done` never follows it.
        let body = body.scan(false, |errored, frame| {
            if *errored {
                return futures::future::ready(None);
            }
            if matches!(frame, SseFrame::Error(_)) {
                *errored = true;
            }
            futures::future::ready(Some(frame))
        });

        let stream = futures::stream::once(async move { SseFrame::Metadata(metadata) })
            .chain(body)
            .boxed();
        Ok(stream)
    }

    /// Drop a tenant's schema cache. Defaults to the process tenant.
    pub async fn refresh_schema(&self, tenant: Option<&str>) -> ExplainResult<String> {
        let tenant = match tenant {
            Some(raw) => Tenant::parse(raw)?,
            None => Tenant::parse(&self.config.default_tenant)?,
        };
        schema::refresh_schema(&self.kv, &tenant).await?;
        info!(tenant = %tenant, "Schema cache dropped");
        Ok(tenant.as_str().to_string())
    }

    /// Resolve a hostname to its provisioned tenant, if any.
    pub async fn resolve_hostname(&self, hostname: &str) -> ExplainResult<Option<String>> {
        let Some(value) = origins::get(&self.kv, hostname).await? else {
            return Ok(None);
        };
        let Some((name, _)) = value.split_once('.') else {
            return Ok(None);
        };
        match Tenant::parse(name) {
            Ok(tenant) => Ok(Some(tenant.as_str().to_string())),
            Err(_) => Ok(None),
        }
    }

    async fn prepare(&self, request: &ExplainRequest) -> ExplainResult<RequestContext> {
        let tenant = tenant_router::resolve_tenant(
            request.tenant.as_deref(),
            request.hostname.as_deref(),
            &self.kv,
            &self.config.default_tenant,
        )
        .await?;
        self.ensure_attached(&tenant)?;

        let parse_started = Instant::now();
        let intent = intent::parse_intent(
            &self.llm,
            &request.question,
            request.page_uri.as_deref(),
        )
        .await;
        let parse_ms = elapsed_ms(parse_started);

        let chat_history = history::sanitize_history(request.history.as_ref());

        Ok(RequestContext {
            tenant,
            intent,
            chat_history,
            component_index: request.component_index.unwrap_or(0),
            parse_ms,
        })
    }

    /// Attach the tenant's database file on first use.
    fn ensure_attached(&self, tenant: &Tenant) -> ExplainResult<()> {
        let Some(dir) = &self.config.tenant_db_dir else {
            return Ok(());
        };
        let mut attached = self
            .attached
            .lock()
            .map_err(|_| ExplainError::Database(explain_db::DbError::LockPoisoned))?;
        if attached.contains(tenant.as_str()) {
            return Ok(());
        }
        let path = dir.join(format!("{}.sqlite", tenant.as_str()));
        self.db.attach_tenant(tenant, &path)?;
        attached.insert(tenant.as_str().to_string());
        Ok(())
    }

    /// Collect the data snapshot for an intent.
    async fn collect(
        &self,
        tenant: &Tenant,
        intent: &ParsedIntent,
        component_index: usize,
    ) -> ExplainResult<CollectOutcome> {
        if intent.domain == QuestionDomain::AtdwImport {
            let (config, trace) = import::collect_import(&self.db, tenant, intent).await?;
            return Ok(CollectOutcome {
                data: CollectedData::Import { config, trace },
                targets: Vec::new(),
                cache_hit: false,
            });
        }

        let schema = schema::get_schema(&self.db, &self.kv, tenant).await?;
        let page_uri = intent.page_uri.as_deref().unwrap_or("");
        let cache_key = trace_cache::key(
            tenant.as_str(),
            page_uri,
            &intent.component_type,
            component_index,
        );

        // The cache lookup and the product-name resolution are
        // independent; run them concurrently.
        let (cached, targets) = tokio::join!(
            async {
                match trace_cache::get::<CachedTrace>(&self.kv, &cache_key).await {
                    Ok(hit) => hit,
                    Err(e) => {
                        warn!(error = %e, "Trace cache read failed");
                        None
                    }
                }
            },
            async { self.resolve_targets(tenant, &schema, intent) },
        );
        let targets = targets?;

        if let Some(mut hit) = cached {
            debug!(key = %cache_key, "Trace cache hit");
            rescore_targets(&mut hit.trace, &targets);
            return Ok(CollectOutcome {
                data: CollectedData::Component {
                    config: hit.config,
                    trace: hit.trace,
                },
                targets,
                cache_hit: true,
            });
        }

        let page = pages::find_page(&self.db, tenant, page_uri)?;
        let Some(page) = page else {
            let step = component::available_blocks_step(None, &[], &intent.component_type);
            return Ok(CollectOutcome {
                data: CollectedData::Component {
                    config: component::ComponentConfig::default(),
                    trace: vec![step],
                },
                targets,
                cache_hit: false,
            });
        };

        let all_blocks = pages::page_blocks(&self.db, tenant, page.id, None)?;
        let matching: Vec<&pages::BlockRow> = all_blocks
            .iter()
            .filter(|b| b.block_type == intent.component_type)
            .collect();

        let Some(block_row) = matching.get(component_index).copied() else {
            let step =
                component::available_blocks_step(Some(&page), &all_blocks, &intent.component_type);
            return Ok(CollectOutcome {
                data: CollectedData::Component {
                    config: component::ComponentConfig::default(),
                    trace: vec![step],
                },
                targets,
                cache_hit: false,
            });
        };

        let block = component::load_block(&self.db, tenant, &schema, block_row).await?;
        let (config, trace) = if block.block_type == handles::PRODUCTS_BLOCK_TYPE {
            let (config, trace) =
                component::run_filter_chain(&self.db, tenant, &schema, &block, &targets).await?;
            let snapshot = CachedTrace {
                config: config.clone(),
                trace: trace.clone(),
            };
            if let Err(e) = trace_cache::put(&self.kv, &cache_key, &snapshot).await {
                warn!(error = %e, "Trace cache write failed");
            }
            (config, trace)
        } else {
            component::inspect_block(&block)
        };

        Ok(CollectOutcome {
            data: CollectedData::Component { config, trace },
            targets,
            cache_hit: false,
        })
    }

    /// Resolve the intent's product names to entry ids.
    fn resolve_targets(
        &self,
        tenant: &Tenant,
        schema: &schema::SchemaCache,
        intent: &ParsedIntent,
    ) -> ExplainResult<Vec<i64>> {
        let Some(products_section) = schema.section(handles::SECTION_PRODUCTS) else {
            return Ok(Vec::new());
        };
        let mut targets = Vec::new();
        for name in &intent.product_names {
            let hits = products::find_products_by_title(
                &self.db,
                tenant,
                name,
                products_section,
                NAME_RESOLUTION_CAP,
            )?;
            for hit in hits {
                if !targets.contains(&hit.id) {
                    targets.push(hit.id);
                }
            }
        }
        Ok(targets)
    }
}

/// Re-derive the target predicate of cached product-set steps for this
/// request's targets.
fn rescore_targets(steps: &mut [TraceStep], targets: &[i64]) {
    for step in steps {
        if PRODUCT_SET_STEPS.contains(&step.step) {
            step.target_present = trace::target_present(&step.product_ids, targets);
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_request_bodies() {
        let ok = validate_request(&json!({
            "question": "why?",
            "pageUri": "/stay",
            "componentIndex": 1,
            "history": [{"role": "user", "content": "hi"}]
        }))
        .unwrap();
        assert_eq!(ok.question, "why?");
        assert_eq!(ok.page_uri.as_deref(), Some("/stay"));
        assert_eq!(ok.component_index, Some(1));
        assert_eq!(ok.history.as_ref().unwrap().len(), 1);

        for bad in [
            json!("just a string"),
            json!([1, 2, 3]),
            json!({}),
            json!({"question": ""}),
            json!({"question": "   "}),
            json!({"question": 42}),
        ] {
            let err = validate_request(&bad).unwrap_err();
            assert!(matches!(err, ExplainError::BadRequest(_)), "{bad}");
        }
    }

    #[test]
    fn question_is_trimmed() {
        let ok = validate_request(&json!({"question": "  why?  "})).unwrap();
        assert_eq!(ok.question, "why?");
    }

    #[test]
    fn rescoring_updates_product_set_steps_only() {
        let mut steps = vec![
            TraceStep::readout(TraceStepName::ResolveRegions, "readout").counted(2),
            TraceStep::with_products(TraceStepName::Limit, "final", vec![401, 402], &[999]),
        ];
        assert_eq!(steps[1].target_present, Some(false));

        rescore_targets(&mut steps, &[402]);
        assert_eq!(steps[0].target_present, None);
        assert_eq!(steps[1].target_present, Some(true));

        rescore_targets(&mut steps, &[]);
        assert_eq!(steps[1].target_present, None);
    }
}
