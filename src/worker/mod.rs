//! Ask Worker: the main processing loop for `/ask` and
//! `/smart` jobs, plus the stale-recovery and cleanup sweeps that keep the
//! queue substrate healthy. Spawn/shutdown shape: one `tokio::spawn` per
//! background concern, collected `JoinHandle`s aborted on shutdown, adapted
//! to cooperative cancellation via `CancellationToken` since the
//! pick-and-process loop blocks on a notification wait rather than a fixed
//! interval tick.

pub mod deps;

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::answer::AnswerGenerator;
use crate::collaborators::{ChatAction, SendOutcome};
use crate::error::{AskError, AskResult};
use crate::models::{AskJob, AskKind, ClassifiedQuery, Confidence, Intent, SearchResponse};
use crate::normalize;
use crate::queue::notify::QueueNotifier;

use deps::Dependencies;

const NOTIFY_CHANNEL: &str = "ask_queue_channel";

pub struct AskWorker {
    deps: Arc<Dependencies>,
}

/// Returned by [`AskWorker::start`]; aborts every spawned loop on shutdown.
pub struct WorkerHandles {
    handles: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl WorkerHandles {
    pub async fn shutdown(self) {
        info!("shutting down ask worker");
        self.cancel.cancel();
        for handle in self.handles {
            handle.abort();
        }
    }
}

impl AskWorker {
    pub fn new(deps: Arc<Dependencies>) -> Self {
        Self { deps }
    }

    pub fn start(&self) -> WorkerHandles {
        let cancel = CancellationToken::new();
        let handles = vec![
            self.spawn_pick_loop(cancel.clone()),
            self.spawn_stale_recovery(cancel.clone()),
            self.spawn_cleanup(cancel.clone()),
        ];
        info!(count = handles.len(), "ask worker started");
        WorkerHandles { handles, cancel }
    }

    fn spawn_pick_loop(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let deps = self.deps.clone();
        tokio::spawn(async move {
            let mut notifier = match QueueNotifier::connect(&deps.database_url, NOTIFY_CHANNEL).await {
                Ok(notifier) => Some(notifier),
                Err(err) => {
                    error!(%err, "failed to connect queue notifier, falling back to plain polling");
                    None
                }
            };
            let wait = Duration::from_secs(deps.queue_config.notification_wait_secs);

            loop {
                if cancel.is_cancelled() {
                    return;
                }

                match deps.ask_queue.pick().await {
                    Ok(Some(job)) => {
                        let id = job.id;
                        let attempt_count = job.attempt_count;
                        if let Err(err) = process_ask(&deps, &job).await {
                            warn!(id, attempt_count, %err, "ask processing failed");
                            let final_failure = deps.ask_queue.fail(id, attempt_count, &err.to_string()).await;
                            match final_failure {
                                Ok(false) => notify_failure(&deps, &job).await,
                                Ok(true) => {}
                                Err(store_err) => error!(id, %store_err, "failed to record ask failure"),
                            }
                        }
                        continue;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        error!(%err, "failed to pick ask job");
                    }
                }

                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = async {
                        match notifier.as_mut() {
                            Some(notifier) => notifier.wait(wait).await,
                            None => tokio::time::sleep(wait).await,
                        }
                    } => {}
                }
            }
        })
    }

    fn spawn_stale_recovery(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let deps = self.deps.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(deps.queue_config.stale_sweep_interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => {}
                }
                if let Err(err) = deps.ask_queue.recover_stale().await {
                    error!(%err, "stale ask recovery sweep failed");
                }
            }
        })
    }

    fn spawn_cleanup(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let deps = self.deps.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(6 * 60 * 60));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => {}
                }
                match deps.ask_queue.cleanup_old(deps.queue_config.cleanup_after_days).await {
                    Ok(deleted) if deleted > 0 => info!(deleted, "cleaned up old ask_queue rows"),
                    Ok(_) => {}
                    Err(err) => error!(%err, "ask_queue cleanup sweep failed"),
                }
            }
        })
    }
}

async fn notify_failure(deps: &Dependencies, job: &AskJob) {
    let text = "Sorry, I couldn't process that question after several attempts.";
    if let Err(err) = deps.chat.send_message(job.chat_id, text, Some(job.reply_to_message_id), false).await {
        warn!(chat_id = job.chat_id, %err, "failed to notify user of final ask failure");
    }
}

/// `ProcessAsk`.
async fn process_ask(deps: &Dependencies, job: &AskJob) -> AskResult<()> {
    let _ = deps.chat.send_chat_action(job.chat_id, ChatAction::Typing).await;

    // a. Normalize.
    let question = normalize::normalize(&job.question);
    if question.is_empty() {
        return Err(AskError::EmptyInput);
    }

    // b. Classify intent; for `/ask` run the default RAG Fusion search
    // speculatively in parallel, since most questions are Factual and will
    // use it directly.
    let classify_fut = deps.classifier.classify(&question);
    let (classified, speculative) = if matches!(job.kind, AskKind::Ask) {
        let speculative_fut = deps.fusion.rag_fusion_search(job.chat_id, &question);
        let (classified, speculative) = tokio::join!(classify_fut, speculative_fut);
        (classified, Some(speculative))
    } else {
        (classify_fut.await, None)
    };

    // c/d. Resolve mentioned nicknames and build the memory context
    // concurrently — independent collaborator calls with no shared state.
    let (resolutions, memory_context) = tokio::join!(
        resolve_nicknames(deps, job.chat_id, &classified),
        build_memory_context(deps, job.chat_id, job.asker_id),
    );

    let question = substitute_resolved_names(&question, &resolutions);
    let search_names: Vec<String> = resolutions.iter().filter_map(|r| r.resolved_name.clone()).collect();

    // e. Retrieve. Reuse the speculative search unless the classified intent
    // actually needs the personal/temporal pool path.
    let response = match speculative {
        Some(result) if !classified.needs_specialized_search() => result?,
        _ => {
            let stable_user_id = matches!(classified.intent, Intent::PersonalSelf).then_some(job.asker_id);
            deps.fusion.search(job.chat_id, &question, &classified, stable_user_id, &search_names).await?
        }
    };

    // f. Confidence gate.
    let answer = match response.confidence {
        Confidence::None if matches!(job.kind, AskKind::Smart) => {
            info!(id = job.id, "no local context found, answering from general knowledge");
            AnswerGenerator::new(&deps.router).generate_general_purpose(&question).await?
        }
        Confidence::None => {
            send_not_found(deps, job).await?;
            deps.ask_queue.complete(job.id).await?;
            return Ok(());
        }
        _ => {
            let context_windows = expand_context(deps, &response, job.chat_id).await?;
            AnswerGenerator::new(&deps.router)
                .generate(&question, &context_windows, memory_context.as_deref(), job.kind)
                .await?
        }
    };

    // i. Sanitize, send, and record.
    send_answer(deps, job, &answer.content).await?;
    deps.ask_queue.complete(job.id).await?;
    deps.memory.record_interaction(job.chat_id, job.asker_id, &question, &answer.content).await;

    Ok(())
}

async fn resolve_nicknames(
    deps: &Dependencies,
    chat_id: i64,
    classified: &ClassifiedQuery,
) -> Vec<crate::intent::NicknameResolution> {
    let futures = classified.mentioned_people.iter().map(|nickname| deps.nickname_resolver.resolve(chat_id, nickname));
    futures::future::join_all(futures)
        .await
        .into_iter()
        .filter(|resolution| resolution.confidence > 0.5)
        .collect()
}

async fn build_memory_context(deps: &Dependencies, chat_id: i64, user_id: i64) -> Option<String> {
    match deps.memory.build_context(chat_id, user_id).await {
        Ok(context) => context,
        Err(err) => {
            warn!(chat_id, user_id, %err, "memory context unavailable, proceeding without it");
            None
        }
    }
}

fn substitute_resolved_names(question: &str, resolutions: &[crate::intent::NicknameResolution]) -> String {
    let mut substituted = question.to_string();
    for resolution in resolutions {
        if let Some(resolved_name) = &resolution.resolved_name {
            substituted = substituted.replace(&resolution.nickname, resolved_name);
        }
    }
    substituted
}

async fn expand_context(
    deps: &Dependencies,
    response: &SearchResponse,
    chat_id: i64,
) -> AskResult<Vec<Vec<crate::models::ContextMessage>>> {
    let hit_ids: Vec<i64> = response
        .results
        .iter()
        .filter(|r| !r.is_context_window)
        .take(20)
        .map(|r| r.message_id)
        .collect();
    Ok(deps.context_window.expand(chat_id, &hit_ids).await?)
}

async fn send_not_found(deps: &Dependencies, job: &AskJob) -> AskResult<()> {
    let text = "I couldn't find anything relevant to that question in this chat's history.";
    deps.chat.send_message(job.chat_id, text, Some(job.reply_to_message_id), false).await.map_err(AskError::Other)?;
    Ok(())
}

async fn send_answer(deps: &Dependencies, job: &AskJob, text: &str) -> AskResult<()> {
    let outcome = deps
        .chat
        .send_message(job.chat_id, text, Some(job.reply_to_message_id), true)
        .await
        .map_err(AskError::Other)?;

    match outcome {
        SendOutcome::Sent => Ok(()),
        SendOutcome::DeactivatedChat => {
            Err(AskError::TransportRejected(format!("chat {} is deactivated", job.chat_id)))
        }
        SendOutcome::ParseError => {
            let plain = strip_html_tags(text);
            deps.chat
                .send_message(job.chat_id, &plain, Some(job.reply_to_message_id), false)
                .await
                .map_err(AskError::Other)?;
            Ok(())
        }
    }
}

fn strip_html_tags(text: &str) -> String {
    lazy_static::lazy_static! {
        static ref TAG_RE: Regex = Regex::new(r"</?[a-zA-Z][^>]*>").unwrap();
    }
    TAG_RE.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::NicknameResolution;

    #[test]
    fn strip_html_tags_removes_markup_only() {
        let stripped = strip_html_tags("<b>Bold</b> and <i>italic</i> text");
        assert_eq!(stripped, "Bold and italic text");
    }

    #[test]
    fn substitute_resolved_names_replaces_nicknames() {
        let resolutions = vec![NicknameResolution {
            nickname: "Вася".to_string(),
            resolved_name: Some("Василий Петров".to_string()),
            confidence: 0.9,
            reasoning: String::new(),
        }];
        let result = substitute_resolved_names("что сказал Вася вчера?", &resolutions);
        assert_eq!(result, "что сказал Василий Петров вчера?");
    }
}
