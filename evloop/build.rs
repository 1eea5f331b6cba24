fn main() {
  cfg_aliases::cfg_aliases! {
      linux: { target_os = "linux" },
      bsd: { any(
        target_os = "macos",
        target_os = "ios",
        target_os = "tvos",
        target_os = "watchos",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "openbsd",
        target_os = "netbsd"
      ) },
      solarish: { any(target_os = "solaris", target_os = "illumos") },
  }
}
