//! 验证码协作者接口 - 业务能力层
//!
//! 公开查询路径有时会带验证码。本系统不破解验证码：
//! 求解是外部协作者的职责，这里只定义接口。
//! 没有配置求解器时，该路径以 `CaptchaRequired` 终止，
//! 解析器自然落到下一条路径。

use async_trait::async_trait;

use crate::error::AppResult;

/// 查询页上的验证码挑战
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaChallenge {
    /// 验证码图片地址（相对门户域名）
    pub image_url: String,
}

/// 验证码求解能力
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// 返回挑战的答案文本
    async fn solve(&self, challenge: &CaptchaChallenge) -> AppResult<String>;
}
