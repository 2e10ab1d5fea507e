//! Persistent search-path registration.
//!
//! The install scope decides where the `PATH` value lives:
//!
//! | Host    | User scope                         | System scope                                   |
//! |---------|------------------------------------|------------------------------------------------|
//! | Windows | `HKCU\Environment`                 | `HKLM\SYSTEM\...\Session Manager\Environment`  |
//! | Others  | `<config>/ffinstall/env.sh`        | `/etc/profile.d/ffinstall.sh`                  |
//!
//! Registration is idempotent: a directory already contained in the stored
//! value is never appended twice.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use super::error::{ManagerError, ManagerResult};
pub use super::traits::PathStore;

/// Where the install lands and whose search path is modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallScope {
    /// Current user only; no elevation needed.
    #[default]
    User,
    /// Every user on the machine; requires elevated privilege.
    System,
}

impl InstallScope {
    /// All scopes, in menu order.
    pub fn all() -> [InstallScope; 2] {
        [InstallScope::User, InstallScope::System]
    }

    /// Config/CLI name of the scope.
    pub fn name(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
        }
    }

    /// Whether the scope needs an elevated process.
    pub fn requires_elevation(&self) -> bool {
        matches!(self, Self::System)
    }
}

impl fmt::Display for InstallScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InstallScope {
    type Err = ManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "system" | "machine" => Ok(Self::System),
            other => Err(ManagerError::InvalidConfig(format!(
                "unknown install scope '{}' (expected user or system)",
                other
            ))),
        }
    }
}

/// Outcome of a search-path registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRegistration {
    /// The directory was appended; holds the new stored value.
    Added { value: String },
    /// The directory was already part of the stored value.
    AlreadyPresent,
}

/// Append `bin_dir` to the stored search path for `scope` unless present.
///
/// The presence check is a plain substring test against the stored value.
/// After a successful write, running processes are notified; a failed
/// notification is logged and otherwise ignored.
pub fn register_path(
    store: &dyn PathStore,
    bin_dir: &Path,
    scope: InstallScope,
) -> ManagerResult<PathRegistration> {
    let dir = bin_dir.to_string_lossy();
    let current = store.read(scope)?;

    if current.contains(dir.as_ref()) {
        info!(dir = %dir, location = %store.location(scope), "Path already exists in search path");
        return Ok(PathRegistration::AlreadyPresent);
    }

    let separator = store.separator();
    let value = if current.is_empty() {
        dir.to_string()
    } else if current.ends_with(separator) {
        format!("{}{}", current, dir)
    } else {
        format!("{}{}{}", current, separator, dir)
    };

    store.write(scope, &value)?;
    info!(dir = %dir, location = %store.location(scope), "Successfully added to search path");

    if let Err(e) = store.broadcast_change() {
        warn!(error = %e, "Environment change broadcast failed; new shells still see the update");
    }

    Ok(PathRegistration::Added { value })
}

/// Whether the current process may modify `scope`.
pub fn has_privilege(scope: InstallScope) -> bool {
    match scope {
        InstallScope::User => true,
        InstallScope::System => system_privilege(),
    }
}

#[cfg(unix)]
fn system_privilege() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(windows)]
fn system_privilege() -> bool {
    registry::can_write_machine_environment()
}

#[cfg(not(any(unix, windows)))]
fn system_privilege() -> bool {
    false
}

/// The store used on this host.
pub fn default_store() -> Box<dyn PathStore> {
    #[cfg(windows)]
    {
        Box::new(registry::RegistryPathStore::new())
    }
    #[cfg(not(windows))]
    {
        Box::new(ProfilePathStore::default_locations())
    }
}

/// Line prefix of the managed export statement.
const EXPORT_PREFIX: &str = "export PATH=\"";

/// Line suffix of the managed export statement.
const EXPORT_SUFFIX: &str = ":$PATH\"";

/// Search path persisted as a shell snippet.
///
/// The snippet holds a single `export PATH="<value>:$PATH"` statement whose
/// `<value>` part is the stored search-path value.
#[derive(Debug, Clone)]
pub struct ProfilePathStore {
    user_file: PathBuf,
    system_file: PathBuf,
    /// Shell profile that should source the user snippet.
    user_profile: Option<PathBuf>,
}

impl ProfilePathStore {
    /// Create a store writing to explicit snippet files.
    pub fn new(user_file: impl Into<PathBuf>, system_file: impl Into<PathBuf>) -> Self {
        Self {
            user_file: user_file.into(),
            system_file: system_file.into(),
            user_profile: None,
        }
    }

    /// Standard snippet locations, sourced from `~/.profile` for user installs.
    pub fn default_locations() -> Self {
        let user_file = dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("ffinstall")
            .join("env.sh");
        let mut store = Self::new(user_file, "/etc/profile.d/ffinstall.sh");
        store.user_profile = dirs::home_dir().map(|home| home.join(".profile"));
        store
    }

    /// Set the shell profile that must source the user snippet.
    pub fn with_user_profile(mut self, profile: impl Into<PathBuf>) -> Self {
        self.user_profile = Some(profile.into());
        self
    }

    fn file_for(&self, scope: InstallScope) -> &Path {
        match scope {
            InstallScope::User => &self.user_file,
            InstallScope::System => &self.system_file,
        }
    }

    fn store_error(&self, scope: InstallScope, reason: impl fmt::Display) -> ManagerError {
        ManagerError::PathStoreFailed {
            location: self.location(scope),
            reason: reason.to_string(),
        }
    }

    /// Append a `source` line for the user snippet to the shell profile once.
    fn ensure_sourced(&self, profile: &Path) -> ManagerResult<()> {
        let source_line = format!(". \"{}\"", self.user_file.display());
        let existing = match fs::read_to_string(profile) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(self.store_error(InstallScope::User, e)),
        };

        if existing.lines().any(|line| line.trim() == source_line) {
            return Ok(());
        }

        let mut updated = existing;
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str("# ffinstall\n");
        updated.push_str(&source_line);
        updated.push('\n');

        fs::write(profile, updated).map_err(|e| self.store_error(InstallScope::User, e))?;
        debug!(profile = %profile.display(), "Profile now sources the ffinstall snippet");
        Ok(())
    }
}

impl PathStore for ProfilePathStore {
    fn read(&self, scope: InstallScope) -> ManagerResult<String> {
        let file = self.file_for(scope);
        let content = match fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
            Err(e) => return Err(self.store_error(scope, e)),
        };

        Ok(content
            .lines()
            .filter_map(|line| {
                line.trim()
                    .strip_prefix(EXPORT_PREFIX)
                    .and_then(|rest| rest.strip_suffix(EXPORT_SUFFIX))
            })
            .last()
            .unwrap_or_default()
            .to_string())
    }

    fn write(&self, scope: InstallScope, value: &str) -> ManagerResult<()> {
        if value.contains('"') || value.contains('\n') {
            return Err(self.store_error(scope, "value contains a quote or newline"));
        }

        let file = self.file_for(scope);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(|e| self.store_error(scope, e))?;
        }

        let content = format!(
            "# Managed by ffinstall\n{}{}{}\n",
            EXPORT_PREFIX, value, EXPORT_SUFFIX
        );
        fs::write(file, content).map_err(|e| self.store_error(scope, e))?;

        if scope == InstallScope::User {
            if let Some(profile) = &self.user_profile {
                self.ensure_sourced(profile)?;
            }
        }
        Ok(())
    }

    fn separator(&self) -> char {
        ':'
    }

    fn location(&self, scope: InstallScope) -> String {
        self.file_for(scope).display().to_string()
    }

    fn broadcast_change(&self) -> ManagerResult<()> {
        debug!("No environment broadcast on this host; new login shells read the snippet");
        Ok(())
    }
}

#[cfg(windows)]
mod registry {
    use std::io;

    use windows_sys::Win32::Foundation::{LPARAM, WPARAM};
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        SendMessageTimeoutW, HWND_BROADCAST, SMTO_ABORTIFHUNG, WM_SETTINGCHANGE,
    };
    use winreg::enums::{
        RegType, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_WRITE,
    };
    use winreg::{RegKey, RegValue};

    use super::{InstallScope, PathStore};
    use crate::manager::error::{ManagerError, ManagerResult};

    const USER_KEY: &str = "Environment";
    const SYSTEM_KEY: &str = r"SYSTEM\CurrentControlSet\Control\Session Manager\Environment";
    const VALUE_NAME: &str = "PATH";

    /// Broadcast timeout in milliseconds.
    const BROADCAST_TIMEOUT_MS: u32 = 5000;

    /// Search path stored in the Windows registry.
    #[derive(Debug, Default)]
    pub struct RegistryPathStore;

    impl RegistryPathStore {
        pub fn new() -> Self {
            Self
        }

        fn open(&self, scope: InstallScope, flags: u32) -> io::Result<RegKey> {
            match scope {
                InstallScope::User => {
                    RegKey::predef(HKEY_CURRENT_USER).open_subkey_with_flags(USER_KEY, flags)
                }
                InstallScope::System => {
                    RegKey::predef(HKEY_LOCAL_MACHINE).open_subkey_with_flags(SYSTEM_KEY, flags)
                }
            }
        }

        fn store_error(&self, scope: InstallScope, e: io::Error) -> ManagerError {
            ManagerError::PathStoreFailed {
                location: self.location(scope),
                reason: e.to_string(),
            }
        }
    }

    pub fn can_write_machine_environment() -> bool {
        RegistryPathStore::new()
            .open(InstallScope::System, KEY_READ | KEY_WRITE)
            .is_ok()
    }

    impl PathStore for RegistryPathStore {
        fn read(&self, scope: InstallScope) -> ManagerResult<String> {
            let key = self
                .open(scope, KEY_READ)
                .map_err(|e| self.store_error(scope, e))?;
            // winreg hands back REG_EXPAND_SZ data unexpanded
            match key.get_value::<String, _>(VALUE_NAME) {
                Ok(value) => Ok(value),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
                Err(e) => Err(self.store_error(scope, e)),
            }
        }

        fn write(&self, scope: InstallScope, value: &str) -> ManagerResult<()> {
            let key = self
                .open(scope, KEY_READ | KEY_WRITE)
                .map_err(|e| self.store_error(scope, e))?;

            let bytes = value
                .encode_utf16()
                .chain(std::iter::once(0))
                .flat_map(|unit| unit.to_le_bytes())
                .collect();
            let data = RegValue {
                bytes,
                vtype: RegType::REG_EXPAND_SZ,
            };
            key.set_raw_value(VALUE_NAME, &data)
                .map_err(|e| self.store_error(scope, e))
        }

        fn separator(&self) -> char {
            ';'
        }

        fn location(&self, scope: InstallScope) -> String {
            match scope {
                InstallScope::User => format!(r"HKCU\{}\{}", USER_KEY, VALUE_NAME),
                InstallScope::System => format!(r"HKLM\{}\{}", SYSTEM_KEY, VALUE_NAME),
            }
        }

        fn broadcast_change(&self) -> ManagerResult<()> {
            let area: Vec<u16> = "Environment"
                .encode_utf16()
                .chain(std::iter::once(0))
                .collect();
            let mut result: usize = 0;

            // SAFETY: `area` is a NUL-terminated UTF-16 buffer that outlives the
            // call, and `result` is a valid out-pointer.
            let sent = unsafe {
                SendMessageTimeoutW(
                    HWND_BROADCAST,
                    WM_SETTINGCHANGE,
                    0 as WPARAM,
                    area.as_ptr() as LPARAM,
                    SMTO_ABORTIFHUNG,
                    BROADCAST_TIMEOUT_MS,
                    &mut result,
                )
            };

            if sent == 0 {
                return Err(ManagerError::PathStoreFailed {
                    location: "WM_SETTINGCHANGE broadcast".to_string(),
                    reason: io::Error::last_os_error().to_string(),
                });
            }
            Ok(())
        }
    }
}

#[cfg(windows)]
pub use registry::RegistryPathStore;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory store that counts broadcasts.
    #[derive(Default)]
    struct MemoryStore {
        user: Mutex<String>,
        system: Mutex<String>,
        writes: AtomicUsize,
        broadcasts: AtomicUsize,
        fail_broadcast: bool,
    }

    impl MemoryStore {
        fn slot(&self, scope: InstallScope) -> &Mutex<String> {
            match scope {
                InstallScope::User => &self.user,
                InstallScope::System => &self.system,
            }
        }
    }

    impl PathStore for MemoryStore {
        fn read(&self, scope: InstallScope) -> ManagerResult<String> {
            Ok(self.slot(scope).lock().unwrap().clone())
        }

        fn write(&self, scope: InstallScope, value: &str) -> ManagerResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            *self.slot(scope).lock().unwrap() = value.to_string();
            Ok(())
        }

        fn separator(&self) -> char {
            ';'
        }

        fn location(&self, scope: InstallScope) -> String {
            format!("memory:{}", scope)
        }

        fn broadcast_change(&self) -> ManagerResult<()> {
            self.broadcasts.fetch_add(1, Ordering::SeqCst);
            if self.fail_broadcast {
                return Err(ManagerError::PathStoreFailed {
                    location: "broadcast".to_string(),
                    reason: "no listeners".to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_scope_parse_and_display() {
        assert_eq!("user".parse::<InstallScope>().unwrap(), InstallScope::User);
        assert_eq!("SYSTEM".parse::<InstallScope>().unwrap(), InstallScope::System);
        assert!("global".parse::<InstallScope>().is_err());
        assert_eq!(InstallScope::System.to_string(), "system");
        assert!(InstallScope::System.requires_elevation());
        assert!(!InstallScope::User.requires_elevation());
        assert!(has_privilege(InstallScope::User));
    }

    #[test]
    fn test_register_into_empty_value_writes_dir_directly() {
        let store = MemoryStore::default();
        let result =
            register_path(&store, Path::new(r"C:\ffmpeg\bin"), InstallScope::System).unwrap();

        assert_eq!(
            result,
            PathRegistration::Added {
                value: r"C:\ffmpeg\bin".to_string()
            }
        );
        assert_eq!(store.read(InstallScope::System).unwrap(), r"C:\ffmpeg\bin");
        assert_eq!(store.read(InstallScope::User).unwrap(), "");
        assert_eq!(store.broadcasts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_register_appends_with_separator() {
        let store = MemoryStore::default();
        *store.user.lock().unwrap() = r"C:\Windows;C:\Tools".to_string();

        register_path(&store, Path::new(r"C:\ffmpeg\bin"), InstallScope::User).unwrap();

        assert_eq!(
            store.read(InstallScope::User).unwrap(),
            r"C:\Windows;C:\Tools;C:\ffmpeg\bin"
        );
    }

    #[test]
    fn test_register_does_not_double_trailing_separator() {
        let store = MemoryStore::default();
        *store.user.lock().unwrap() = r"C:\Windows;".to_string();

        register_path(&store, Path::new(r"C:\ffmpeg\bin"), InstallScope::User).unwrap();

        assert_eq!(
            store.read(InstallScope::User).unwrap(),
            r"C:\Windows;C:\ffmpeg\bin"
        );
    }

    #[test]
    fn test_register_is_idempotent() {
        let store = MemoryStore::default();
        *store.user.lock().unwrap() = r"C:\Windows".to_string();
        let dir = Path::new(r"C:\ffmpeg\bin");

        register_path(&store, dir, InstallScope::User).unwrap();
        let after_first = store.read(InstallScope::User).unwrap();

        let second = register_path(&store, dir, InstallScope::User).unwrap();

        assert_eq!(second, PathRegistration::AlreadyPresent);
        assert_eq!(store.read(InstallScope::User).unwrap(), after_first);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(store.broadcasts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_broadcast_failure_is_not_fatal() {
        let store = MemoryStore {
            fail_broadcast: true,
            ..Default::default()
        };

        let result = register_path(&store, Path::new("/opt/ffmpeg/bin"), InstallScope::User);

        assert!(matches!(result, Ok(PathRegistration::Added { .. })));
        assert_eq!(store.read(InstallScope::User).unwrap(), "/opt/ffmpeg/bin");
    }

    #[test]
    fn test_profile_store_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = ProfilePathStore::new(
            temp.path().join("user").join("env.sh"),
            temp.path().join("system.sh"),
        );

        assert_eq!(store.read(InstallScope::User).unwrap(), "");

        store
            .write(InstallScope::User, "/home/me/.local/ffmpeg/bin")
            .unwrap();

        assert_eq!(
            store.read(InstallScope::User).unwrap(),
            "/home/me/.local/ffmpeg/bin"
        );
        assert_eq!(store.read(InstallScope::System).unwrap(), "");

        let content = fs::read_to_string(temp.path().join("user").join("env.sh")).unwrap();
        assert!(content.contains("export PATH=\"/home/me/.local/ffmpeg/bin:$PATH\""));
    }

    #[test]
    fn test_profile_store_registration_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let profile = temp.path().join(".profile");
        fs::write(&profile, "umask 022").unwrap();

        let store = ProfilePathStore::new(temp.path().join("env.sh"), temp.path().join("sys.sh"))
            .with_user_profile(&profile);

        let bin = Path::new("/opt/ffmpeg/bin");
        register_path(&store, bin, InstallScope::User).unwrap();
        register_path(&store, Path::new("/opt/other/bin"), InstallScope::User).unwrap();
        let second = register_path(&store, bin, InstallScope::User).unwrap();

        assert_eq!(second, PathRegistration::AlreadyPresent);
        assert_eq!(
            store.read(InstallScope::User).unwrap(),
            "/opt/ffmpeg/bin:/opt/other/bin"
        );

        let profile_content = fs::read_to_string(&profile).unwrap();
        assert!(profile_content.starts_with("umask 022\n"));
        assert_eq!(profile_content.matches("env.sh").count(), 1);
    }

    #[test]
    fn test_profile_store_rejects_quotes() {
        let temp = TempDir::new().unwrap();
        let store = ProfilePathStore::new(temp.path().join("env.sh"), temp.path().join("sys.sh"));

        let result = store.write(InstallScope::User, "/opt/\"odd\"/bin");
        assert!(matches!(result, Err(ManagerError::PathStoreFailed { .. })));
    }
}
