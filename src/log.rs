use ash::vk;

/// Verbosity ceiling for the Vulkan validation messenger.
///
/// Messages below the selected level are filtered out inside the driver and
/// never reach the [`tracing`] callback.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum VulkanLogLevel {
    Verbose,
    Info,
    Warning,
    Error,
}

impl VulkanLogLevel {
    /// The `VK_EXT_debug_utils` severity mask corresponding to this level
    /// and everything more severe.
    pub(crate) fn severity_mask(self) -> vk::DebugUtilsMessageSeverityFlagsEXT {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Severity;
        match self {
            VulkanLogLevel::Verbose => {
                Severity::VERBOSE | Severity::INFO | Severity::WARNING | Severity::ERROR
            }
            VulkanLogLevel::Info => Severity::INFO | Severity::WARNING | Severity::ERROR,
            VulkanLogLevel::Warning => Severity::WARNING | Severity::ERROR,
            VulkanLogLevel::Error => Severity::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_masks_are_cumulative() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Severity;

        assert!(
            VulkanLogLevel::Warning
                .severity_mask()
                .contains(Severity::ERROR)
        );
        assert!(
            !VulkanLogLevel::Error
                .severity_mask()
                .contains(Severity::WARNING)
        );
        assert!(
            VulkanLogLevel::Verbose
                .severity_mask()
                .contains(Severity::VERBOSE | Severity::ERROR)
        );
    }
}
