use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::core::config::{
    select_provider, AppConfig, CheckConfig, CheckOverrides, ENV_WEBHOOK_URL,
};
use crate::core::cost::normalizer::{normalize, NormalizedCost};
use crate::core::cost::threshold::{evaluate_normalized, Evaluation};
use crate::core::error::CheckError;
use crate::core::message::{render_failure, render_report};
use crate::core::models::window::DayWindow;
use crate::core::notify::{Notifier, PreviewNotifier, SlackWebhook};
use crate::core::providers::{build_source, BillingSource, Provider};
use crate::core::secrets::ValueResolver;

/// Outcome of one invocation, as reported at the process or HTTP boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exceeded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvocationResult {
    fn succeeded(provider: Provider, cost: &NormalizedCost, evaluation: &Evaluation) -> Self {
        Self {
            success: true,
            provider: Some(provider),
            date: Some(cost.date()),
            cost: Some(cost.total_cost()),
            exceeded: Some(evaluation.overall.exceeded),
            error: None,
        }
    }

    pub fn failed(provider: Option<Provider>, date: Option<NaiveDate>, err: &CheckError) -> Self {
        Self {
            success: false,
            provider,
            date,
            cost: None,
            exceeded: None,
            error: Some(err.to_string()),
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.success {
            0
        } else {
            1
        }
    }

    pub fn http_status(&self) -> u16 {
        if self.success {
            200
        } else {
            500
        }
    }
}

/// Collaborators for a single check.
pub struct CheckContext<'a> {
    pub source: &'a dyn BillingSource,
    pub notifier: &'a dyn Notifier,
    pub threshold: Decimal,
    pub account_label: Option<&'a str>,
}

struct CheckOutcome {
    cost: NormalizedCost,
    evaluation: Evaluation,
}

async fn check(ctx: &CheckContext<'_>, window: &DayWindow) -> Result<CheckOutcome, CheckError> {
    let provider = ctx.source.provider();
    let source = ctx
        .source
        .fetch(window)
        .await
        .map_err(CheckError::Acquisition)?;

    let cost = normalize(source, window.report_date())?;
    let evaluation = evaluate_normalized(&cost, ctx.threshold);
    info!(
        cost = %cost.total_cost(),
        threshold = %ctx.threshold,
        exceeded = evaluation.overall.exceeded,
        "Cost evaluated"
    );

    let account_label = match ctx.account_label {
        Some(label) => label.to_string(),
        None => ctx
            .source
            .describe_account()
            .await
            .unwrap_or_else(|| format!("{} account", provider.display_name())),
    };

    let message = render_report(provider, &account_label, &cost, &evaluation);
    ctx.notifier.send(&message).await?;

    Ok(CheckOutcome { cost, evaluation })
}

/// Acquire, normalize, evaluate and report. Any failure is turned into an
/// error notification and a failed result; nothing escapes.
pub async fn run(ctx: &CheckContext<'_>, window: &DayWindow) -> InvocationResult {
    let provider = ctx.source.provider();
    info!(provider = %provider, date = %window.report_date(), "Starting cost check");
    match check(ctx, window).await {
        Ok(outcome) => {
            info!(provider = %provider, "Cost check completed");
            InvocationResult::succeeded(provider, &outcome.cost, &outcome.evaluation)
        }
        Err(err) => {
            report_failure(Some(ctx.notifier), Some(provider), &err).await;
            InvocationResult::failed(Some(provider), Some(window.report_date()), &err)
        }
    }
}

/// Best-effort error notification. Delivery problems are logged and dropped.
pub async fn report_failure(
    notifier: Option<&dyn Notifier>,
    provider: Option<Provider>,
    err: &CheckError,
) {
    error!(kind = err.kind(), error = %err, "Cost check failed");

    let Some(notifier) = notifier else {
        warn!("No notification sink available; error report not delivered");
        return;
    };

    let message = render_failure(provider, err);
    match notifier.send(&message).await {
        Ok(()) => info!(sink = notifier.name(), "Error report delivered"),
        Err(delivery) => warn!(
            sink = notifier.name(),
            error = %delivery,
            "Failed to deliver error report"
        ),
    }
}

fn build_notifier(
    webhook_url: Option<&str>,
    dry_run: bool,
    timeout: Duration,
) -> Option<Box<dyn Notifier>> {
    if dry_run {
        return Some(Box::new(PreviewNotifier::stderr()));
    }
    let url = webhook_url?;
    match SlackWebhook::new(url, timeout) {
        Ok(hook) => Some(Box::new(hook)),
        Err(e) => {
            warn!(error = %e, "Failed to build Slack webhook client");
            None
        }
    }
}

fn resolver_for(app: &AppConfig) -> ValueResolver {
    app.value_resolver().unwrap_or_else(|e| {
        warn!(error = %format!("{:#}", e), "Secret store unavailable; using environment only");
        ValueResolver::env_only()
    })
}

/// Report a failure that happened before a provider was known, using
/// whatever webhook can still be resolved.
pub async fn fail_before_check(
    app: &AppConfig,
    err: CheckError,
    dry_run: bool,
) -> InvocationResult {
    let resolver = resolver_for(app);
    let webhook_url = resolver.get(ENV_WEBHOOK_URL).await;
    let notifier = build_notifier(webhook_url.as_deref(), dry_run, app.request_timeout());
    report_failure(notifier.as_deref(), None, &err).await;
    InvocationResult::failed(None, None, &err)
}

/// Select the provider (flag, environment, file) and [`invoke`] it for
/// yesterday's window.
pub async fn check_selected(
    app: &AppConfig,
    provider_flag: Option<&str>,
    overrides: CheckOverrides,
) -> InvocationResult {
    match select_provider(provider_flag, app) {
        Ok(provider) => {
            let request = InvocationRequest {
                provider,
                overrides,
            };
            invoke(app, &request, DayWindow::yesterday()).await
        }
        Err(err) => fail_before_check(app, err, overrides.dry_run).await,
    }
}

/// One external trigger: which provider to check and how.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub provider: Provider,
    pub overrides: CheckOverrides,
}

/// Resolve configuration, build collaborators, then [`run`] the check.
pub async fn invoke(
    app: &AppConfig,
    request: &InvocationRequest,
    window: DayWindow,
) -> InvocationResult {
    let provider = request.provider;
    let resolver = resolver_for(app);

    let webhook_url = resolver.get(ENV_WEBHOOK_URL).await;
    let notifier = build_notifier(
        webhook_url.as_deref(),
        request.overrides.dry_run,
        app.request_timeout(),
    );

    let setup = async {
        let config =
            CheckConfig::resolve(provider, app, &resolver, webhook_url, &request.overrides).await?;
        let source = build_source(&config)
            .map_err(|e| CheckError::configuration(format!("{:#}", e)))?;
        Ok::<_, CheckError>((config, source))
    }
    .await;

    let (config, source) = match setup {
        Ok(parts) => parts,
        Err(err) => {
            report_failure(notifier.as_deref(), Some(provider), &err).await;
            return InvocationResult::failed(Some(provider), Some(window.report_date()), &err);
        }
    };

    let Some(notifier) = notifier else {
        let err = CheckError::configuration("No notification sink available");
        report_failure(None, Some(provider), &err).await;
        return InvocationResult::failed(Some(provider), Some(window.report_date()), &err);
    };

    let ctx = CheckContext {
        source: source.as_ref(),
        notifier: notifier.as_ref(),
        threshold: config.threshold,
        account_label: config.account_label.as_deref(),
    };
    run(&ctx, &window).await
}
