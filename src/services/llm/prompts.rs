//! Prompt template registry.
//!
//! Every analysis kind maps to a template; unrecognized kinds fall back to
//! the generic template with the kind spliced in, so new tags pass straight
//! through to the model.

use std::collections::HashMap;

pub const KIND_SIMILARITY: &str = "新闻相似度分析";
pub const KIND_MULTI_FEATURE: &str = "增强型多特征分析";
pub const KIND_IMPORTANCE_STANCE: &str = "重要程度和立场分析";
pub const KIND_DEEP: &str = "深度分析";
pub const KIND_KEY_POINTS: &str = "关键观点";
pub const KIND_FACT_CHECK: &str = "事实核查";
pub const KIND_SUMMARY: &str = "摘要";
pub const KIND_CUSTOM: &str = "自定义";

/// Known analysis kinds; anything else is passed through unchanged.
pub const KNOWN_KINDS: &[&str] = &[
    KIND_SIMILARITY,
    KIND_MULTI_FEATURE,
    KIND_IMPORTANCE_STANCE,
    KIND_DEEP,
    KIND_KEY_POINTS,
    KIND_FACT_CHECK,
    KIND_SUMMARY,
    KIND_CUSTOM,
];

pub struct PromptManager {
    templates: HashMap<String, String>,
}

impl Default for PromptManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptManager {
    pub fn new() -> Self {
        let mut templates = HashMap::new();

        templates.insert(
            KIND_SIMILARITY.to_string(),
            "对比分析以下多条新闻报道，指出它们报道的异同、侧重点与潜在的信息偏差。\n\
             新闻列表：\n{news}\n请用中文输出对比分析。"
                .to_string(),
        );
        templates.insert(
            KIND_IMPORTANCE_STANCE.to_string(),
            "评估以下新闻的重要程度（0-10 的数值）和报道立场（-1.0 到 1.0，负值批评、正值支持）。\n\
             标题：{title}\n内容：{content}\n\
             仅返回 JSON：{\"importance\": 数值, \"stance\": 数值}"
                .to_string(),
        );
        templates.insert(
            KIND_DEEP.to_string(),
            "对以下新闻进行深度分析，包括背景、影响与可能的发展方向。\n标题：{title}\n内容：{content}".to_string(),
        );
        templates.insert(
            KIND_KEY_POINTS.to_string(),
            "提炼以下新闻的关键观点，逐条列出。\n标题：{title}\n内容：{content}".to_string(),
        );
        templates.insert(
            KIND_FACT_CHECK.to_string(),
            "对以下新闻中的主要事实陈述进行核查，指出可疑之处。\n标题：{title}\n内容：{content}".to_string(),
        );
        templates.insert(
            KIND_SUMMARY.to_string(),
            "为以下新闻生成一个简短的摘要（不超过100字）：\n标题：{title}\n内容：{content}".to_string(),
        );
        templates.insert(
            "generic".to_string(),
            "对以下新闻进行「{kind}」分析。\n标题：{title}\n内容：{content}".to_string(),
        );
        templates.insert(
            "entity_extraction".to_string(),
            "提取以下新闻中的命名实体（人物、组织、地点、事件等）：\n标题：{title}\n内容：{content}\n\
             仅返回实体列表，格式为JSON：{\"entities\": [{\"text\": \"实体名\", \"type\": \"实体类型\"}]}"
                .to_string(),
        );
        templates.insert(
            "keyword_extraction".to_string(),
            "从以下新闻中提取5个关键词：\n标题：{title}\n内容：{content}\n\
             仅返回关键词列表，格式为JSON：{\"keywords\": [\"关键词1\", \"关键词2\"]}"
                .to_string(),
        );
        templates.insert(
            "categorize".to_string(),
            "将以下新闻分类到这些类别之一：{categories}\n\n标题：{title}\n内容：{content}\n\n\
             仅返回分类ID，格式为JSON：{\"category\": \"分类ID\"}"
                .to_string(),
        );

        Self { templates }
    }

    pub fn get_template_content(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(|s| s.as_str())
    }

    /// Template for an analysis kind, falling back to the generic one.
    pub fn template_for_kind(&self, kind: &str) -> &str {
        self.templates
            .get(kind)
            .or_else(|| self.templates.get("generic"))
            .map(|s| s.as_str())
            .expect("generic template always present")
    }

    /// Substitute `{placeholders}` in a template.
    pub fn render(template: &str, values: &[(&str, &str)]) -> String {
        let mut rendered = template.to_string();
        for (key, value) in values {
            rendered = rendered.replace(&format!("{{{}}}", key), value);
        }
        rendered
    }
}
