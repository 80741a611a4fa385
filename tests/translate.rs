use pretty_assertions::assert_eq;
use taskify::{Config, PragmaRecords, TranslationErrorKind, translate, translate_with_records};

fn library() -> Config {
    Config {
        entry_function: None,
        ..Config::default()
    }
}

fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("`{needle}` not found in:\n{haystack}"))
}

const REDUCE: &str = r#"#include <stdio.h>
#include <omp.h>

int main(int argc, char **argv) {
    int n = 100;
    int sum = 0;
    int i;
#pragma omp parallel for reduction(+:sum)
    for (i = 0; i < n; i++) {
        sum += i;
    }
    printf("%d\n", sum);
    return 0;
}
"#;

#[test]
fn test_parallel_for_reduction_in_main() {
    let out = translate(REDUCE, &Config::default()).unwrap();

    assert!(out.starts_with("#include \"hclib.h\"\n"));
    assert!(!out.contains("omp.h"));
    assert!(!out.contains("#pragma omp"));
    assert!(!out.contains("__taskify_pragma"));

    assert!(out.contains(
        "    pragma8_omp_parallel *____ctx = (pragma8_omp_parallel *)____arg;\n    int sum = 0;\n"
    ));
    assert!(out.contains("    __sync_fetch_and_add(____ctx->sum_reduce_ptr, sum);\n"));
    assert!(out.contains("    ____new_ctx->sum_reduce_ptr = &(sum);\n"));
    assert!(!out.contains("____reduction_lock"));

    assert!(out.contains("hclib_launch(main_entrypoint, ____entry_ctx, NULL, 0);"));
    assert!(out.contains("{ ____entry_ctx->____ret = (0); goto ____entry_exit; }"));

    let typedef = position(&out, "typedef struct _pragma8_omp_parallel {");
    let entry = position(&out, "static void main_entrypoint(void *____arg) {");
    let main = position(&out, "int main(int argc, char **argv) {");
    let kernel = position(
        &out,
        "static void pragma8_omp_parallel_hclib_async(void *____arg, const int ___iter0) {",
    );
    assert!(typedef < entry && entry < main && main < kernel);
}

const FIB: &str = "int fib(int n) {
    int x, y;
    if (n < 2) return n;
#pragma omp task shared(x)
    x = fib(n - 1);
#pragma omp task shared(y)
    y = fib(n - 2);
#pragma omp taskwait
    return x + y;
}
";

#[test]
fn test_tasks_and_taskwait() {
    let out = translate(FIB, &library()).unwrap();

    assert!(out.contains("    (*(____ctx->x_ptr)) = fib((*(____ctx->n_ptr)) - 1);\n"));
    assert!(out.contains("    (*(____ctx->y_ptr)) = fib((*(____ctx->n_ptr)) - 2);\n"));
    assert!(out.contains("hclib_async(pragma4_omp_task_hclib_async, ____new_ctx, NULL, 0, NULL);"));
    assert!(out.contains("hclib_async(pragma6_omp_task_hclib_async, ____new_ctx, NULL, 0, NULL);"));
    assert!(out.contains("hclib_end_finish(); hclib_start_finish();\n    return x + y;"));
    assert!(!out.contains("entrypoint"));
}

#[test]
fn test_untouched_file_is_returned_verbatim() {
    let src = "#include <stdio.h>\nint add(int a, int b) { return a + b; }\n";
    assert_eq!(translate(src, &Config::default()).unwrap(), src);
}

#[test]
fn test_internal_function_pointer_is_rejected() {
    let src = "static void work(void *p) { }\nvoid run(void) {\n  void (*f)(void *) = work;\n}\n";
    let err = translate(src, &library()).unwrap_err();
    assert_eq!(err.kind(), Some(TranslationErrorKind::Safety));
    assert!(err.to_string().contains("line 3"));
}

#[test]
fn test_foreign_runtime_call_is_rejected() {
    let src = "int main(void) {\n  int t = omp_get_thread_num();\n  return t;\n}\n";
    let err = translate(src, &Config::default()).unwrap_err();
    assert_eq!(err.kind(), Some(TranslationErrorKind::Safety));
    assert!(err.to_string().contains("omp_get_thread_num"));
}

#[test]
fn test_directive_outside_block_is_structural() {
    let src = "void f(int a) {\n  if (a)\n#pragma omp task\n    g();\n}\n";
    let err = translate(src, &library()).unwrap_err();
    assert_eq!(err.kind(), Some(TranslationErrorKind::Structural));
}

#[test]
fn test_semantic_errors() {
    let product = "void f(int n, int p) {\n  int i;\n#pragma omp parallel for reduction(*:p)\n  for (i = 0; i < n; i++) { p *= 2; }\n}\n";
    let sections = "void f(void) {\n#pragma omp sections\n  { }\n}\n";
    let descending = "void f(int n) {\n  int i;\n#pragma omp parallel for\n  for (i = n; i < 0; i--) { }\n}\n";

    for src in [product, sections, descending] {
        let err = translate(src, &library()).unwrap_err();
        assert_eq!(err.kind(), Some(TranslationErrorKind::Semantic), "{src}");
    }
}

const ENCODED: &str = "void f(void) {\n  __taskify_pragma(\"taskwait\", \"\", \"pragma2\");\n}\n";

#[test]
fn test_metadata_records_are_checked() {
    let matching = PragmaRecords::parse("2 2 #pragma omp taskwait\n").unwrap();
    let out = translate_with_records(ENCODED, &library(), matching).unwrap();
    assert!(out.contains("  hclib_end_finish(); hclib_start_finish();\n"));

    let elsewhere = PragmaRecords::parse("3 3 #pragma omp taskwait\n").unwrap();
    let err = translate_with_records(ENCODED, &library(), elsewhere).unwrap_err();
    assert_eq!(err.kind(), Some(TranslationErrorKind::Structural));

    let other = PragmaRecords::parse("2 2 #pragma omp barrier\n").unwrap();
    assert!(translate_with_records(ENCODED, &library(), other).is_err());
}

#[test]
fn test_runtime_header_and_tile_are_configurable() {
    let mut config = library();
    config.runtime.header = "rt.h".to_string();
    config.loop_tile = 8;
    let src = "void f(int n, int *a) {\n#pragma omp parallel for\n  for (int i = 0; i < n; i++) a[i] = 0;\n}\n";

    let out = translate(src, &config).unwrap();
    assert!(out.starts_with("#include \"rt.h\"\n"));
    assert!(out.contains("____domain[0].tile = 8;"));
    assert!(out.contains(
        "    int i;\n    i = ___iter0;\n    hclib_start_finish();\n    do (*(____ctx->a_ptr))[i] = 0; while (0);\n    hclib_end_finish();\n"
    ));
}
