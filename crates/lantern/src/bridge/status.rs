pub const MCPE_PROTOCOL: u32 = 27;
pub const MCPE_VERSION: &str = "0.11.0";

/// Value of the transport's `"name"` option, shown in the client server list.
pub fn broadcast_name(name: &str, online: usize, max: usize) -> String {
    let first_line = name.split('\n').next().unwrap_or_default();
    format!(
        "MCPE;{};{};{};{};{}",
        first_line, MCPE_PROTOCOL, MCPE_VERSION, online, max
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_all_fields() {
        assert_eq!(
            broadcast_name("Lantern Server", 3, 20),
            "MCPE;Lantern Server;27;0.11.0;3;20"
        );
    }

    #[test]
    fn keeps_only_first_line() {
        assert_eq!(
            broadcast_name("Top line\nsecond line", 0, 10),
            "MCPE;Top line;27;0.11.0;0;10"
        );
        assert_eq!(broadcast_name("", 0, 1), "MCPE;;27;0.11.0;0;1");
    }
}
