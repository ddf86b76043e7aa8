//! 用户实体

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub mobile: String,
    pub nick_name: Option<String>,
}

impl User {
    /// 展示名：昵称为空时使用手机号
    pub fn display_name(&self) -> &str {
        match self.nick_name.as_deref() {
            Some(nick) if !nick.is_empty() => nick,
            _ => &self.mobile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let mut user = User {
            id: 1,
            mobile: "13800000000".to_string(),
            nick_name: Some("小王".to_string()),
        };
        assert_eq!(user.display_name(), "小王");

        user.nick_name = Some(String::new());
        assert_eq!(user.display_name(), "13800000000");

        user.nick_name = None;
        assert_eq!(user.display_name(), "13800000000");
    }
}
