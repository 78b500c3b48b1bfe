//! 规则引擎服务
//!
//! 组合编译器、执行器和节点存储，对外提供创建规则、合并规则、按标识评估三个操作。
//! 外部 API 层可以通过 `RuleError::code()` 把错误映射为响应状态。

use crate::compiler::RuleCompiler;
use crate::error::{Result, RuleError};
use crate::executor::RuleExecutor;
use crate::models::{EvaluationResult, Node, Record};
use crate::store::{NodeStore, PersistedNode};
use eligibility_shared::config::EngineSettings;
use eligibility_shared::observability::metrics::{record_rule_created, record_rule_evaluation};
use serde_json::Value;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// 规则引擎服务
pub struct RuleEngine<S: NodeStore> {
    compiler: RuleCompiler,
    executor: RuleExecutor,
    store: S,
}

impl<S: NodeStore> RuleEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_settings(store, &EngineSettings::default())
    }

    pub fn with_settings(store: S, settings: &EngineSettings) -> Self {
        let mut executor = RuleExecutor::new().with_max_depth(settings.max_tree_depth);
        if settings.trace_enabled {
            executor = executor.with_trace();
        }

        Self {
            compiler: RuleCompiler::with_limits(
                settings.max_nesting_depth,
                settings.max_tree_depth,
            ),
            executor,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn compiler(&self) -> &RuleCompiler {
        &self.compiler
    }

    /// 解析并保存一条规则，空规则不落库并返回 None
    #[instrument(skip_all, fields(rule = %rule))]
    pub fn create_rule(&self, rule: &Value) -> Result<Option<PersistedNode>> {
        let tree = self
            .compiler
            .parse_value(rule)
            .inspect_err(|e| warn!(error = %e, "规则创建被拒绝"))?;

        self.persist(tree, "single")
    }

    /// 合并多条规则并保存合并后的树
    #[instrument(skip_all, fields(count = rules.len()))]
    pub fn combine_rules<R: AsRef<str>>(&self, rules: &[R]) -> Result<Option<PersistedNode>> {
        let tree = self
            .compiler
            .combine(rules)
            .inspect_err(|e| warn!(error = %e, "规则合并被拒绝"))?;

        self.persist(tree, "combined")
    }

    /// 按请求体中的规则标识加载规则树并评估用户数据
    ///
    /// `ast` 需要带整数 `id`，`user_data` 需要是非空对象。
    #[instrument(skip_all)]
    pub fn evaluate_rule(&self, ast: &Value, user_data: &Value) -> Result<EvaluationResult> {
        if is_blank(ast) || is_blank(user_data) {
            warn!("评估请求缺少 ast 或 user_data");
            return Err(RuleError::InvalidInput(
                "ast 和 user_data 都不能为空".to_string(),
            ));
        }

        let id = ast
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| RuleError::InvalidInput(format!("ast 缺少整数 id: {}", ast)))?;
        let record = Record::from_value(user_data)?;

        let tree = self
            .store
            .load(id)
            .inspect_err(|e| warn!(id, error = %e, "规则树加载失败"))?;

        let result = self.run(Some(&tree), &record)?;
        info!(id, matched = result.matched, "规则评估完成");
        Ok(result)
    }

    /// 直接评估内存中的规则树，规则树缺失时返回结构错误
    pub fn evaluate_tree(&self, tree: Option<&Node>, record: &Record) -> Result<bool> {
        self.run(tree, record).map(|result| result.matched)
    }

    fn run(&self, tree: Option<&Node>, record: &Record) -> Result<EvaluationResult> {
        let start = Instant::now();
        let result = self.executor.execute(tree, record)?;
        record_rule_evaluation(result.matched, start.elapsed().as_secs_f64());
        Ok(result)
    }

    fn persist(&self, tree: Option<Node>, kind: &'static str) -> Result<Option<PersistedNode>> {
        let Some(tree) = tree else {
            return Ok(None);
        };

        let saved = self.store.save(&tree)?;
        record_rule_created(kind);
        info!(id = saved.id, kind, rule = %tree, "规则已创建");
        Ok(Some(saved))
    }
}

/// null、false、0、空字符串、空数组、空对象都视为缺失
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
