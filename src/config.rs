//! Translation settings.
//!
//! Every runtime symbol the generator emits is named here, so the output can be retargeted
//! at a different cooperative task runtime without touching the generator.

/// Symbols of the task-parallel runtime targeted by generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeApi {
    /// Header included at the top of every translated file.
    pub header: String,
    /// `launch(fn, arg, deps, ndeps)`: process-wide initialize/run/finalize.
    pub launch: String,
    /// `forasync_future(fn, arg, ndims, domain, mode)`: recursive parallel-for returning a future.
    pub forasync_future: String,
    /// Mode constant passed to `forasync_future`.
    pub forasync_mode: String,
    pub future_type: String,
    pub future_wait: String,
    pub loop_domain_type: String,
    /// `async(fn, arg, futures, nfutures, locale)`: fire-and-forget spawn.
    pub spawn: String,
    /// `spawn_with_deps(fn, arg, locale, n_in, n_out, addr, len, ...)`.
    pub spawn_with_deps: String,
    pub start_finish: String,
    pub end_finish: String,
    pub mutex_type: String,
    pub mutex_initializer: String,
    pub mutex_lock: String,
    pub mutex_unlock: String,
    /// Atomic-combine primitive for `+` reductions over integral types.
    pub atomic_add: String,
}

impl Default for RuntimeApi {
    fn default() -> Self {
        Self {
            header: "hclib.h".to_string(),
            launch: "hclib_launch".to_string(),
            forasync_future: "hclib_forasync_future".to_string(),
            forasync_mode: "FORASYNC_MODE_RECURSIVE".to_string(),
            future_type: "hclib_future_t".to_string(),
            future_wait: "hclib_future_wait".to_string(),
            loop_domain_type: "hclib_loop_domain_t".to_string(),
            spawn: "hclib_async".to_string(),
            spawn_with_deps: "hclib_emulate_omp_task".to_string(),
            start_finish: "hclib_start_finish".to_string(),
            end_finish: "hclib_end_finish".to_string(),
            mutex_type: "pthread_mutex_t".to_string(),
            mutex_initializer: "PTHREAD_MUTEX_INITIALIZER".to_string(),
            mutex_lock: "pthread_mutex_lock".to_string(),
            mutex_unlock: "pthread_mutex_unlock".to_string(),
            atomic_add: "__sync_fetch_and_add".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Function whose body is handed to the runtime's launch primitive.
    pub entry_function: Option<String>,
    /// Marker symbol of the sentinel calls produced by the pragma encoder.
    pub sentinel: String,
    /// Tile size of generated loop domains; `-1` lets the runtime choose.
    pub loop_tile: i64,
    /// Foreign runtime API that must not survive translation.
    pub forbidden_calls: Vec<String>,
    pub runtime: RuntimeApi,
}

const OMP_RUNTIME_API: &[&str] = &[
    "omp_get_thread_num",
    "omp_get_num_threads",
    "omp_get_max_threads",
    "omp_set_num_threads",
    "omp_get_num_procs",
    "omp_in_parallel",
    "omp_set_dynamic",
    "omp_get_dynamic",
    "omp_set_nested",
    "omp_get_nested",
    "omp_get_wtime",
    "omp_get_wtick",
    "omp_init_lock",
    "omp_destroy_lock",
    "omp_set_lock",
    "omp_unset_lock",
    "omp_test_lock",
    "omp_init_nest_lock",
    "omp_destroy_nest_lock",
    "omp_set_nest_lock",
    "omp_unset_nest_lock",
    "omp_test_nest_lock",
];

impl Default for Config {
    fn default() -> Self {
        Self {
            entry_function: Some("main".to_string()),
            sentinel: "__taskify_pragma".to_string(),
            loop_tile: -1,
            forbidden_calls: OMP_RUNTIME_API.iter().map(|s| s.to_string()).collect(),
            runtime: RuntimeApi::default(),
        }
    }
}

impl Config {
    pub fn is_forbidden_call(&self, name: &str) -> bool {
        self.forbidden_calls.iter().any(|f| f == name)
    }

    pub fn is_entry(&self, name: &str) -> bool {
        self.entry_function.as_deref() == Some(name)
    }
}
