use std::env;

/// Process-wide configuration, read once at startup and passed down to the
/// session and link factories. Credentials are never baked into the binary;
/// a `.env` file is honored when present.
#[derive(Clone)]
pub struct Config {
    // 必需的凭证，缺失时启动即失败
    pub openai_api_key: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,

    // 网络配置
    pub port: u16,
    pub realtime_base_url: String,
    pub twilio_api_base: String,

    // 会话参数
    pub model: String,
    pub voice: String,
    pub temperature: f32,
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// Missing credentials are a startup-fatal condition; everything else
    /// has a default.
    pub fn from_env() -> Result<Self, &'static str> {
        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| "Missing OpenAI API key. Please set OPENAI_API_KEY in the environment or .env file.")?;
        let twilio_account_sid = env::var("TWILIO_ACCOUNT_SID")
            .map_err(|_| "Missing Twilio credentials. Please set TWILIO_ACCOUNT_SID in the environment or .env file.")?;
        let twilio_auth_token = env::var("TWILIO_AUTH_TOKEN")
            .map_err(|_| "Missing Twilio credentials. Please set TWILIO_AUTH_TOKEN in the environment or .env file.")?;

        let port = match env::var("PORT") {
            Ok(v) => v.parse().map_err(|_| "Failed to parse PORT")?,
            Err(_) => 5050,
        };

        let realtime_base_url = env::var("OPENAI_REALTIME_URL")
            .unwrap_or_else(|_| "wss://api.openai.com/v1/realtime".to_string());
        let twilio_api_base = env::var("TWILIO_API_BASE")
            .unwrap_or_else(|_| "https://api.twilio.com".to_string());

        let model =
            env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-realtime".to_string());
        let voice = env::var("OPENAI_VOICE").unwrap_or_else(|_| "alloy".to_string());
        let temperature = match env::var("OPENAI_TEMPERATURE") {
            Ok(v) => v.parse().map_err(|_| "Failed to parse OPENAI_TEMPERATURE")?,
            Err(_) => 0.8,
        };

        Ok(Self {
            openai_api_key,
            twilio_account_sid,
            twilio_auth_token,
            port,
            realtime_base_url,
            twilio_api_base,
            model,
            voice,
            temperature,
        })
    }

    /// The realtime endpoint with model and temperature query parameters.
    pub fn realtime_url(&self) -> String {
        format!(
            "{}?model={}&temperature={}",
            self.realtime_base_url, self.model, self.temperature
        )
    }

    #[cfg(test)]
    pub fn test_defaults() -> Self {
        Self {
            openai_api_key: "sk-test".to_string(),
            twilio_account_sid: "AC00000000000000000000000000000000".to_string(),
            twilio_auth_token: "token".to_string(),
            port: 5050,
            realtime_base_url: "wss://api.openai.com/v1/realtime".to_string(),
            twilio_api_base: "https://api.twilio.com".to_string(),
            model: "gpt-realtime".to_string(),
            voice: "alloy".to_string(),
            temperature: 0.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_url_carries_model_and_temperature() {
        let config = Config::test_defaults();
        assert_eq!(
            config.realtime_url(),
            "wss://api.openai.com/v1/realtime?model=gpt-realtime&temperature=0.8"
        );
    }
}
