//! 业务指标
//!
//! 通过 metrics crate 的宏记录规则相关的计数和耗时，未安装 recorder 时为空操作。

/// 注册指标描述
pub fn describe_metrics() {
    metrics::describe_counter!("rule_evaluations_total", "Total number of rule evaluations");
    metrics::describe_histogram!(
        "rule_evaluation_duration_seconds",
        "Rule evaluation duration in seconds"
    );
    metrics::describe_counter!("rules_created_total", "Total number of persisted rule trees");
}

/// 记录规则评估
#[inline]
pub fn record_rule_evaluation(matched: bool, duration_secs: f64) {
    metrics::counter!(
        "rule_evaluations_total",
        "matched" => matched.to_string()
    )
    .increment(1);

    metrics::histogram!("rule_evaluation_duration_seconds").record(duration_secs);
}

/// 记录规则创建，`kind` 区分单条规则和合并规则
#[inline]
pub fn record_rule_created(kind: &'static str) {
    metrics::counter!("rules_created_total", "kind" => kind).increment(1);
}
