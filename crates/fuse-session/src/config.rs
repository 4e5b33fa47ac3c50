/// Options forwarded to the kernel at mount time.
///
/// The handoff core treats this as opaque; it only threads the value
/// through to the `Mounter` and `SessionFactory` collaborators.
#[derive(Debug, Clone, Default)]
pub struct MountConfig {
    /// Name reported for the filesystem (first column of /etc/mtab).
    pub fs_name: String,
    /// Filesystem subtype, if any.
    pub subtype: String,
    pub read_only: bool,
    /// Additional "key=value" mount options.
    pub options: Vec<String>,
}
