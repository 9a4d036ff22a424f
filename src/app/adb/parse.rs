use crate::app::models::DeviceEntry;

/// Parses `adb devices` output. Only tab-separated rows are devices; the
/// "List of devices attached" header and daemon banners carry no tab.
pub fn parse_device_list(output: &str) -> Vec<DeviceEntry> {
    output
        .lines()
        .filter(|line| line.contains('\t'))
        .map(|line| {
            let mut fields = line.split('\t');
            let id = fields.next().unwrap_or_default().trim();
            let status = fields.next().unwrap_or_default().trim();
            DeviceEntry::new(id, status)
        })
        .collect()
}

/// First non-empty line of `adb version`, e.g. "Android Debug Bridge version 1.0.41".
pub fn parse_version_headline(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_wireless_device() {
        let output = "List of devices attached\n192.168.1.5:5555\tdevice\n";
        assert_eq!(
            parse_device_list(output),
            vec![DeviceEntry::new("192.168.1.5:5555", "device")]
        );
    }

    #[test]
    fn keeps_emitted_order_and_trims_fields() {
        let output = "* daemon not running; starting now at tcp:5037\n\
                      * daemon started successfully\n\
                      List of devices attached\n\
                      emulator-5554\toffline\n\
                      \x20R58M12ABCDE \t unauthorized \n\
                      10.0.0.7:41235\tdevice\textra\r\n";
        let parsed = parse_device_list(output);
        assert_eq!(
            parsed,
            vec![
                DeviceEntry::new("emulator-5554", "offline"),
                DeviceEntry::new("R58M12ABCDE", "unauthorized"),
                DeviceEntry::new("10.0.0.7:41235", "device"),
            ]
        );
    }

    #[test]
    fn no_tab_lines_means_no_devices() {
        assert!(parse_device_list("List of devices attached\n\n").is_empty());
        assert!(parse_device_list("").is_empty());
    }

    #[test]
    fn parse_is_idempotent() {
        let output = "List of devices attached\nA\tdevice\nB\toffline\n";
        assert_eq!(parse_device_list(output), parse_device_list(output));
    }

    #[test]
    fn reads_version_headline() {
        let output = "\nAndroid Debug Bridge version 1.0.41\nVersion 35.0.2-12147458\n";
        assert_eq!(
            parse_version_headline(output).as_deref(),
            Some("Android Debug Bridge version 1.0.41")
        );
        assert_eq!(parse_version_headline("  \n"), None);
    }
}
