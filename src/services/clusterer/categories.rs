//! Static category tables and the keyword-based categorizer.
//!
//! Used standalone by the data processor and inside event assembly. The LLM
//! path replaces these rules when a configured service is available.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::utils::text::tokenize;

/// Standard category ids with their display names.
pub const STANDARD_CATEGORIES: &[(&str, &str)] = &[
    ("politics", "时政"),
    ("military", "军事"),
    ("international", "国际"),
    ("technology", "科技"),
    ("business", "财经"),
    ("science", "科学"),
    ("sports", "体育"),
    ("entertainment", "娱乐"),
    ("health", "健康"),
    ("culture", "文化"),
    ("environment", "环境"),
    ("disaster", "灾害"),
    ("general", "综合"),
];

/// Keyword table per category; matching prefers title hits over content hits.
pub static CATEGORY_KEYWORDS: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            "politics",
            vec![
                "政治", "政府", "总统", "主席", "选举", "外交", "人大", "政协",
                "法律", "法规", "立法", "司法", "行政", "议会", "议员", "内阁", "首相", "总理",
                "宪法", "法案", "投票", "民主",
            ],
        ),
        (
            "military",
            vec![
                "军事", "军队", "武器", "导弹", "战争", "战斗", "军演", "国防", "航母", "坦克",
                "战机", "士兵", "将军", "作战", "军备", "部队", "战略", "战术", "军舰", "军官",
            ],
        ),
        (
            "international",
            vec![
                "国际", "全球", "世界", "外国", "海外", "联合国", "欧盟", "美国", "俄罗斯",
                "日本", "韩国", "印度", "英国", "法国", "德国", "国际关系", "跨国", "多边",
                "双边", "国际组织",
            ],
        ),
        (
            "technology",
            vec![
                "科技", "技术", "互联网", "软件", "硬件", "ai", "人工智能", "5g", "数字", "创新",
                "编程", "算法", "大数据", "云计算", "区块链", "芯片", "半导体", "量子",
                "机器学习", "深度学习", "机器人", "物联网", "网络安全",
            ],
        ),
        (
            "business",
            vec![
                "商业", "经济", "金融", "股市", "投资", "企业", "公司", "市场", "贸易", "产业",
                "创业", "融资", "上市", "ipo", "并购", "利润", "营收", "gdp", "通胀", "央行",
                "货币政策", "财政政策", "税收", "关税", "汇率", "利率", "债券", "基金", "银行",
            ],
        ),
        (
            "science",
            vec![
                "科学", "研究", "发现", "实验", "宇宙", "物理", "化学", "生物", "医学", "天文",
                "地理", "基因", "dna", "细胞", "分子", "原子", "理论", "粒子", "进化",
            ],
        ),
        (
            "sports",
            vec![
                "体育", "足球", "篮球", "比赛", "奥运", "冠军", "运动员", "联赛", "赛事", "网球",
                "排球", "乒乓球", "羽毛球", "游泳", "田径", "马拉松", "世界杯", "欧冠", "nba",
                "cba",
            ],
        ),
        (
            "entertainment",
            vec![
                "娱乐", "明星", "电影", "音乐", "演出", "综艺", "电视", "艺人", "演员", "导演",
                "歌手", "演唱会", "电视剧", "选秀", "颁奖", "票房", "剧情", "舞台",
            ],
        ),
        (
            "health",
            vec![
                "健康", "医疗", "疾病", "药物", "治疗", "医院", "医生", "患者", "保健", "养生",
                "疫苗", "病毒", "细菌", "感染", "预防", "康复", "营养", "饮食", "锻炼", "症状",
                "诊断", "手术", "公共卫生",
            ],
        ),
        (
            "culture",
            vec![
                "文化", "艺术", "历史", "传统", "教育", "学校", "学生", "老师", "课程", "文学",
                "诗歌", "小说", "绘画", "雕塑", "舞蹈", "戏剧", "博物馆", "展览", "文物", "遗产",
                "考古", "民俗", "宗教", "哲学", "建筑师", "architect",
            ],
        ),
        (
            "environment",
            vec![
                "环境", "生态", "污染", "保护", "气候变化", "全球变暖", "碳排放", "可再生能源",
                "可持续发展", "节能", "减排", "森林", "海洋", "湿地", "生物多样性", "濒危物种",
                "环保", "回收", "水资源", "空气质量",
            ],
        ),
        (
            "disaster",
            vec![
                "灾害", "地震", "台风", "飓风", "洪水", "干旱", "火灾", "山火", "海啸", "泥石流",
                "滑坡", "暴雨", "暴雪", "冰雹", "龙卷风", "沙尘暴", "救灾", "疏散", "预警",
                "救援", "伤亡",
            ],
        ),
    ]
});

/// Topic keyword table used by the title-similarity grouping.
pub static TOPIC_KEYWORDS: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        ("ai", vec!["ai", "artificial intelligence", "chatgpt", "openai", "llm", "gpt", "机器学习", "人工智能"]),
        ("tech", vec!["technology", "tech", "software", "hardware", "app", "digital", "computer", "internet", "web", "online", "科技", "技术"]),
        ("social", vec!["social", "society", "community", "public", "social media", "facebook", "twitter", "instagram", "tiktok", "社交", "社会"]),
        ("politics", vec!["politics", "government", "election", "president", "policy", "political", "vote", "democracy", "政治", "政府"]),
        ("business", vec!["business", "economy", "market", "stock", "company", "finance", "investment", "商业", "经济", "市场", "金融"]),
        ("health", vec!["health", "medical", "medicine", "disease", "virus", "doctor", "hospital", "patient", "健康", "医疗", "疾病"]),
        ("environment", vec!["environment", "climate", "weather", "pollution", "green", "sustainable", "ecology", "wildlife", "nature", "环境", "气候", "生态"]),
        ("sports", vec!["sports", "game", "match", "team", "player", "championship", "tournament", "体育", "比赛", "选手", "冠军"]),
        ("entertainment", vec!["entertainment", "movie", "film", "music", "celebrity", "star", "actor", "singer", "娱乐", "电影", "音乐", "明星"]),
        ("science", vec!["science", "research", "study", "discovery", "experiment", "scientist", "科学", "研究", "发现", "实验"]),
    ]
});

/// Small Chinese/English stopword list for keyword extraction.
pub static STOP_WORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "的", "了", "在", "是", "和", "与", "或", "有", "被", "将", "把", "从", "到", "对", "为",
        "the", "a", "an", "of", "to", "in", "on", "for", "and", "or", "is", "are", "was", "with",
    ]
});

/// Display name for a category id; `uncategorized` and `military` are
/// special-cased the way the UI expects.
pub fn category_name(category_id: &str) -> String {
    match category_id {
        "all" => "所有新闻".to_string(),
        "uncategorized" => "未分类".to_string(),
        "military" => "军事新闻".to_string(),
        _ => STANDARD_CATEGORIES
            .iter()
            .find(|(id, _)| *id == category_id)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| "未分类".to_string()),
    }
}

/// Keyword-table categorization. Title matches win over content matches;
/// no match at all yields "general".
pub fn categorize_by_keywords(title: &str, content: &str) -> &'static str {
    let title_lower = title.to_lowercase();
    let text = format!("{} {}", title_lower, content.to_lowercase());

    let mut matched: Vec<(&'static str, &'static str)> = Vec::new();
    for (category_id, keywords) in CATEGORY_KEYWORDS.iter() {
        for keyword in keywords {
            if text.contains(keyword) {
                matched.push((category_id, keyword));
                break;
            }
        }
    }

    if matched.is_empty() {
        return "general";
    }

    matched
        .iter()
        .find(|(_, keyword)| title_lower.contains(keyword))
        .map(|(category_id, _)| *category_id)
        .unwrap_or(matched[0].0)
}

/// Fallback keyword extraction from a title: tokenize, drop stopwords and
/// single characters, keep the first five distinct tokens.
pub fn extract_title_keywords(title: &str) -> Vec<String> {
    let mut seen = HashMap::new();
    let mut keywords = Vec::new();

    for token in tokenize(title) {
        if token.chars().count() < 2 {
            continue;
        }
        if STOP_WORDS.contains(&token.as_str()) {
            continue;
        }
        if seen.insert(token.clone(), ()).is_none() {
            keywords.push(token);
            if keywords.len() == 5 {
                break;
            }
        }
    }

    keywords
}

/// Topics detected in a title (for the title-similarity grouping).
pub fn detect_topics(title_lower: &str) -> std::collections::HashSet<&'static str> {
    let mut topics = std::collections::HashSet::new();
    for (topic, keywords) in TOPIC_KEYWORDS.iter() {
        for keyword in keywords {
            if title_lower.contains(keyword) {
                topics.insert(*topic);
                break;
            }
        }
    }
    topics
}
