//! 字符串清理辅助函数
//!
//! 处理请求中的可选字符串字段：去除空白并过滤空值。

/// 清理并验证字符串，空白字符串归一化为 None
///
/// # Example
/// ```ignore
/// let url = clean_optional_string(req.url.as_ref());
/// ```
#[inline]
pub fn clean_optional_string(s: Option<&String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// 字符串清理扩展 trait
pub trait StringExt {
    /// 清理字符串并返回 Option，空字符串返回 None
    fn clean(&self) -> Option<String>;

    /// 清理字符串，返回清理后的字符串
    fn trimmed(&self) -> String;
}

impl StringExt for str {
    #[inline]
    fn clean(&self) -> Option<String> {
        let trimmed = self.trim();
        if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
    }

    #[inline]
    fn trimmed(&self) -> String {
        self.trim().to_string()
    }
}

impl StringExt for String {
    #[inline]
    fn clean(&self) -> Option<String> {
        self.as_str().clean()
    }

    #[inline]
    fn trimmed(&self) -> String {
        self.as_str().trimmed()
    }
}
