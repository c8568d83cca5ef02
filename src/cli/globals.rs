use secrecy::SecretString;

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub session_secret: SecretString,
    pub token_ttl_hours: u64,
    pub session_ttl_minutes: u64,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(session_secret: SecretString, token_ttl_hours: u64, session_ttl_minutes: u64) -> Self {
        Self {
            session_secret,
            token_ttl_hours,
            session_ttl_minutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(SecretString::from("sssh".to_string()), 24, 60);
        assert_eq!(args.session_secret.expose_secret(), "sssh");
        assert_eq!(args.token_ttl_hours, 24);
        assert_eq!(args.session_ttl_minutes, 60);
    }
}
