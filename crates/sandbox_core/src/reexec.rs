//! Re-entrant process init role.
//!
//! A full OCI-style container library re-execs its own binary with `init` as
//! argv[1] so namespace/cgroup setup can run from inside the new process
//! tree before the requested program is exec'd. `IsolatedRunner` in this
//! crate does not use that pattern — it isolates by attaching the forked
//! child to a cgroup and chrooting it directly in `pre_exec` (see
//! `runner/isolated.rs`), both of which run correctly without a re-exec
//! round trip. The `init` argv convention is kept here only so that argv[1]
//! is a reserved word this binary will never misinterpret as a language tag
//! or flag, in case a future runner backend does need the re-exec handoff.
//!
//! Callers must still invoke [`maybe_enter_init_role`] as the first statement
//! of `main`, ahead of everything else, so that reservation holds regardless
//! of which runner ends up selected at startup.

/// If this process was re-exec'd with `init` as argv[1], pins to a single OS
/// thread and exits. No runner in this crate currently re-execs into this
/// role — see the module doc — so in practice this is unreachable from the
/// server's own spawn paths; it exists to keep the argv convention reserved.
///
/// Returns normally (without side effects) when the process was started in
/// the ordinary server/client role.
pub fn maybe_enter_init_role() {
    let is_init = std::env::args().nth(1).as_deref() == Some("init");
    if !is_init {
        return;
    }

    // Mirrors the discipline a real container-init entry point needs: run on
    // the process's original thread, before the async runtime or logging
    // touch any thread-local or signal state.
    let handle = std::thread::Builder::new()
        .name("container-init".into())
        .spawn(run_container_init)
        .expect("failed to spawn container-init thread");

    match handle.join() {
        Ok(()) => {
            eprintln!("container init returned unexpectedly; this is a fatal condition");
            std::process::exit(1);
        }
        Err(_) => std::process::exit(1),
    }
}

fn run_container_init() {
    // No runner backend in this crate re-execs into `init` (see the module
    // doc): IsolatedRunner does its namespace/chroot/cgroup setup directly in
    // the forked child's `pre_exec`, not via a re-exec handoff. This stays a
    // deliberate dead end rather than a silent no-op standing in for one.
    eprintln!("container-init role was invoked but no runner backend uses it");
    std::process::exit(1);
}
