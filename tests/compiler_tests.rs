//! End-to-end compilation tests: whole programs in, framework code out.

use lumen_lang::{compile, CompileOptions, Target};
use pretty_assertions::assert_eq;

const TARGETS: [Target; 3] = [Target::React, Target::Vue, Target::Svelte];

fn compile_for(source: &str, target: Target) -> lumen_lang::Output {
    compile(
        source,
        &CompileOptions {
            target,
            validate: true,
        },
    )
    .unwrap_or_else(|err| panic!("{} failed for {}: {}", err.kind(), target, err))
}

const COUNTER: &str = "\
page Counter:
  state count: int = 0
  derived doubled = count * 2
  fn increment():
    count = count + 1
  layout:
    col gap=16:
      text \"Count: {doubled}\"
      button \"+1\" -> increment()
";

#[test]
fn counter_compiles_for_every_target_with_positive_stats() {
    let source_tokens = COUNTER.split_whitespace().count();
    for target in TARGETS {
        let out = compile_for(COUNTER, target);
        assert!(out.line_count > 0, "{} produced no lines", target);
        assert!(out.token_count > 0, "{} produced no tokens", target);
        // The savings figure shown by tooling must be computable.
        let savings = 1.0 - source_tokens as f64 / out.token_count as f64;
        assert!(savings.is_finite());
    }
}

#[test]
fn counter_react_output_shape() {
    let code = compile_for(COUNTER, Target::React).code;
    assert!(code.contains("const [count, setCount] = useState(0);"));
    assert!(code.contains("const doubled = useMemo(() => count * 2, [count]);"));
    assert!(code.contains("setCount(count + 1);"));
    assert!(code.contains("onClick={(event) => increment()}"));
    assert!(code.contains("Count: {doubled}"));
}

#[test]
fn counter_vue_output_shape() {
    let code = compile_for(COUNTER, Target::Vue).code;
    assert!(code.contains("const count = ref(0);"));
    assert!(code.contains("const doubled = computed(() => count.value * 2);"));
    assert!(code.contains("count.value = count.value + 1;"));
    assert!(code.contains("@click=\"increment()\""));
    assert!(code.contains("Count: {{ doubled }}"));
}

#[test]
fn counter_svelte_output_shape() {
    let code = compile_for(COUNTER, Target::Svelte).code;
    assert!(code.contains("let count = 0;"));
    assert!(code.contains("$: doubled = count * 2;"));
    assert!(code.contains("count = count + 1;"));
    assert!(code.contains("on:click={(event) => increment()}"));
    assert!(code.contains("Count: {doubled}"));
}

#[test]
fn unterminated_string_fails_as_lex_error_with_no_code() {
    let source = "page P:\n  state s: str = \"never closed\n";
    let err = compile(source, &CompileOptions::default()).unwrap_err();
    assert_eq!(err.kind(), "LexError");
}

#[test]
fn targets_are_distinguishable_by_syntax_markers() {
    let react = compile_for(COUNTER, Target::React).code;
    let vue = compile_for(COUNTER, Target::Vue).code;
    let svelte = compile_for(COUNTER, Target::Svelte).code;
    assert!(react.contains("useState") && !vue.contains("useState") && !svelte.contains("useState"));
    assert!(vue.contains("<script setup>") && !react.contains("<script setup>"));
    assert!(svelte.contains("$:") && !react.contains("$:") && !vue.contains("$:"));
}

#[test]
fn compilation_is_deterministic() {
    for target in TARGETS {
        let a = compile_for(COUNTER, target);
        let b = compile_for(COUNTER, target);
        assert_eq!(a.code, b.code);
    }
}

const DASHBOARD: &str = "\
model Task:
  id: int required unique
  title: str required
  done: bool = false
  validate title.length > 0 \"Title is required\"

page Dashboard:
  state tasks: list[Task] = []
  state query: str = \"\"
  derived pending = tasks.filter(t => t.done == false)
  layout:
    col gap=16:
      input query
      for task in pending:
        row:
          text \"{task.title}\"
";

#[test]
fn list_rendering_keys_by_model_id_field() {
    let react = compile_for(DASHBOARD, Target::React).code;
    assert!(react.contains("{pending.map((task) => ("));
    assert!(react.contains("<React.Fragment key={task.id}>"));

    let vue = compile_for(DASHBOARD, Target::Vue).code;
    assert!(vue.contains("v-for=\"task in pending\" :key=\"task.id\""));

    let svelte = compile_for(DASHBOARD, Target::Svelte).code;
    assert!(svelte.contains("{#each pending as task (task.id)}"));
}

#[test]
fn model_schema_and_validator_are_shared_sections() {
    for target in TARGETS {
        let code = compile_for(DASHBOARD, target).code;
        assert!(code.contains("// ===== models.js ====="));
        assert!(code.contains("export const TaskSchema"));
        assert!(code.contains("export function validateTask(record)"));
        assert!(code.contains("if (!(record.title.length > 0)) errors.push(\"Title is required\");"));
    }
}

#[test]
fn two_way_binding_per_target() {
    let react = compile_for(DASHBOARD, Target::React).code;
    assert!(react.contains("value={query}"));
    assert!(react.contains("setQuery(event.target.value)"));

    let vue = compile_for(DASHBOARD, Target::Vue).code;
    assert!(vue.contains("v-model=\"query\""));

    let svelte = compile_for(DASHBOARD, Target::Svelte).code;
    assert!(svelte.contains("bind:value={query}"));
}

const CHECKED: &str = "\
page Cart:
  state quantity: int = 1
  check quantity > 0 \"Quantity must stay positive\"
  fn decrement():
    quantity = quantity - 1
  layout:
    button \"-\" -> decrement()
";

#[test]
fn check_guard_follows_every_mutation_and_keeps_message_verbatim() {
    let react = compile_for(CHECKED, Target::React).code;
    assert!(react.contains("const nextQuantity = quantity - 1;"));
    assert!(react.contains("setQuantity(nextQuantity);"));
    assert!(react.contains("if (!(nextQuantity > 0)) console.warn(\"Quantity must stay positive\");"));

    let vue = compile_for(CHECKED, Target::Vue).code;
    assert!(vue.contains("quantity.value = quantity.value - 1;"));
    assert!(vue.contains("if (!(quantity.value > 0)) console.warn(\"Quantity must stay positive\");"));

    let svelte = compile_for(CHECKED, Target::Svelte).code;
    assert!(svelte.contains("quantity = quantity - 1;"));
    assert!(svelte.contains("if (!(quantity > 0)) console.warn(\"Quantity must stay positive\");"));
}

const CHAT: &str = "\
page Chat:
  state messages: list[str] = []
  layout:
    col:
      realtime \"chat\" -> messages.push(message)
      for m in messages:
        text \"{m}\"
";

#[test]
fn realtime_elements_become_subscriptions_with_teardown() {
    for target in TARGETS {
        let code = compile_for(CHAT, target).code;
        assert!(code.contains("subscribe(\"chat\""), "{} missing subscribe", target);
        assert!(code.contains("unsubscribe()"), "{} missing teardown", target);
    }
    let react = compile_for(CHAT, Target::React).code;
    assert!(react.contains("setMessages([...messages, message]);"));
    let svelte = compile_for(CHAT, Target::Svelte).code;
    assert!(svelte.contains("messages = [...messages, message];"));
}

const APP: &str = "\
page Home:
  layout:
    text \"Welcome\"

page About:
  layout:
    text \"About us\"

route / -> Home
route /about -> About

auth:
  provider email

roles: admin, editor, viewer
";

#[test]
fn routes_auth_and_roles_compile_to_a_manifest_section() {
    for target in TARGETS {
        let code = compile_for(APP, target).code;
        assert!(code.contains("// ===== routes.js ====="));
        assert!(code.contains("{ path: \"/\", component: Home },"));
        assert!(code.contains("{ path: \"/about\", component: About },"));
        assert!(code.contains("provider: \"email\","));
        assert!(code.contains("export const roles = [\"admin\", \"editor\", \"viewer\"];"));
    }
    let react = compile_for(APP, Target::React).code;
    assert!(react.contains("import Home from \"./Home.jsx\";"));
    let vue = compile_for(APP, Target::Vue).code;
    assert!(vue.contains("import Home from \"./Home.vue\";"));
}

const NESTED: &str = "\
component TaskCard:
  prop title: str
  layout:
    row:
      text \"{title}\"

page Board:
  layout:
    col:
      TaskCard title=\"First\"
";

#[test]
fn components_are_emitted_before_the_pages_that_use_them() {
    let code = compile_for(NESTED, Target::React).code;
    let card = code.find("===== TaskCard.jsx =====").unwrap();
    let board = code.find("===== Board.jsx =====").unwrap();
    assert!(card < board);
    assert!(code.contains("import TaskCard from \"./TaskCard.jsx\";"));
    assert!(code.contains("<TaskCard title=\"First\" />"));
}

#[test]
fn component_props_per_target() {
    let react = compile_for(NESTED, Target::React).code;
    assert!(react.contains("export default function TaskCard({ title })"));
    let vue = compile_for(NESTED, Target::Vue).code;
    assert!(vue.contains("defineProps({ title: String })"));
    let svelte = compile_for(NESTED, Target::Svelte).code;
    assert!(svelte.contains("export let title;"));
}

#[test]
fn non_latin_literals_pass_through_verbatim() {
    let source = "\
page Greeting:
  state name: str = \"世界\"
  layout:
    text \"こんにちは {name}\"
";
    for target in TARGETS {
        let code = compile_for(source, target).code;
        assert!(code.contains("世界"), "{} lost the state literal", target);
        assert!(code.contains("こんにちは"), "{} lost the text literal", target);
    }
}

#[test]
fn effects_compile_per_target() {
    let source = "\
page Clock:
  state ticks: int = 0
  on mount:
    ticks = 1
  watch ticks:
    log(ticks)
  layout:
    text \"{ticks}\"
";
    let react = compile_for(source, Target::React).code;
    assert!(react.contains("useEffect(() => {"));
    assert!(react.contains("}, []);"));
    assert!(react.contains("}, [ticks]);"));

    let vue = compile_for(source, Target::Vue).code;
    assert!(vue.contains("onMounted(() => {"));
    assert!(vue.contains("watch(ticks, () => {"));

    let svelte = compile_for(source, Target::Svelte).code;
    assert!(svelte.contains("onMount(() => {"));
    assert!(svelte.contains("function watchTicks() {"));
    assert!(svelte.contains("$: ticks, watchTicks();"));
}

#[test]
fn svelte_watcher_body_reads_do_not_become_dependencies() {
    // A watcher on one state whose body reads another must not re-run when
    // the other state changes; the body hides behind a function call.
    let source = "\
page Sync:
  state primary: int = 0
  state mirror: int = 0
  watch primary:
    mirror = primary
  layout:
    text \"{mirror}\"
";
    let svelte = compile_for(source, Target::Svelte).code;
    assert!(svelte.contains("function watchPrimary() {"));
    assert!(svelte.contains("$: primary, watchPrimary();"));
    assert!(!svelte.contains("$: primary, (() => {"));
}

#[test]
fn api_declarations_become_fetch_helpers() {
    let source = "\
page Users:
  state users: list[str] = []
  api loadUsers \"https://api.example.com/users\"
  layout:
    text \"users\"
";
    for target in TARGETS {
        let code = compile_for(source, target).code;
        assert!(code.contains("async function loadUsers()"));
        assert!(code.contains("await fetch(\"https://api.example.com/users\")"));
        assert!(code.contains("response.json()"));
    }
}

#[test]
fn conditional_layout_per_target() {
    let source = "\
page Gate:
  state open: bool = false
  layout:
    if open:
      text \"yes\"
    else:
      text \"no\"
";
    let react = compile_for(source, Target::React).code;
    assert!(react.contains("{open ? ("));
    let vue = compile_for(source, Target::Vue).code;
    assert!(vue.contains("<template v-if=\"open\">"));
    assert!(vue.contains("<template v-else>"));
    let svelte = compile_for(source, Target::Svelte).code;
    assert!(svelte.contains("{#if open}"));
    assert!(svelte.contains("{:else}"));
}

const LANDING: &str = "\
page Landing:
  seo title=\"Fresh Produce Weekly\" description=\"Seasonal boxes, delivered\"
  style background=\"linear-gradient(#fff, #eee)\" padding=24
  layout:
    text \"Welcome\"
";

#[test]
fn page_style_and_seo_survive_to_every_target() {
    for target in TARGETS {
        let code = compile_for(LANDING, target).code;
        assert!(code.contains("Fresh Produce Weekly"), "{} lost the seo title", target);
        assert!(
            code.contains("linear-gradient(#fff, #eee)"),
            "{} lost the page style",
            target
        );
    }

    let react = compile_for(LANDING, Target::React).code;
    assert!(react.contains(
        "export const seo = { title: \"Fresh Produce Weekly\", description: \"Seasonal boxes, delivered\" };"
    ));
    assert!(react.contains(
        "<div className=\"page\" style={{ background: \"linear-gradient(#fff, #eee)\", padding: \"24px\" }}>"
    ));

    let vue = compile_for(LANDING, Target::Vue).code;
    assert!(vue.contains("export const seo = {"));
    assert!(vue.contains(
        "<div class=\"page\" style=\"background: linear-gradient(#fff, #eee); padding: 24px\">"
    ));

    let svelte = compile_for(LANDING, Target::Svelte).code;
    assert!(svelte.contains("<script context=\"module\">"));
    assert!(svelte.contains(
        "<div class=\"page\" style=\"background: linear-gradient(#fff, #eee); padding: 24px\">"
    ));
}

const LIMITED: &str = "\
page Search:
  state query: str = \"\"
  check query.length <= 10 \"Query too long\"
  layout:
    input query
";

#[test]
fn two_way_binding_writes_are_guarded() {
    let react = compile_for(LIMITED, Target::React).code;
    assert!(react.contains("const nextQuery = event.target.value;"));
    assert!(react.contains("setQuery(nextQuery);"));
    assert!(react.contains("if (!(nextQuery.length <= 10)) console.warn(\"Query too long\");"));

    let vue = compile_for(LIMITED, Target::Vue).code;
    assert!(vue.contains("import { ref, watch } from \"vue\";"));
    assert!(vue.contains("watch(query, () => {"));
    assert!(vue.contains("if (!(query.value.length <= 10)) console.warn(\"Query too long\");"));

    let svelte = compile_for(LIMITED, Target::Svelte).code;
    assert!(svelte.contains("bind:value={query}"));
    assert!(svelte.contains("$: if (!(query.length <= 10)) console.warn(\"Query too long\");"));
}

#[test]
fn realtime_inside_a_loop_is_rejected() {
    let source = "\
page Feeds:
  state topics: list[str] = [\"news\"]
  state items: list[str] = []
  layout:
    col:
      for topic in topics:
        realtime \"{topic}\" -> items.push(message)
";
    for target in TARGETS {
        let err = compile(source, &CompileOptions { target, validate: true }).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedConstruct", "{}", target);
        assert!(err.to_string().contains("realtime"), "{}: {}", target, err);
    }
}

#[test]
fn semantic_failures_surface_their_kind() {
    let cases = [
        ("page P:\n  derived d = missing\n  layout:\n    text \"x\"\n", "SemanticError"),
        ("page P:\n  derived a = b\n  derived b = a\n  layout:\n    text \"x\"\n", "SemanticError"),
        ("page P:\n  state = 1\n", "ParseError"),
        ("page P:\n  state a: int = 0\n   state b: int = 0\n", "LexError"),
    ];
    for (source, kind) in cases {
        let err = compile(source, &CompileOptions::default()).unwrap_err();
        assert_eq!(err.kind(), kind, "source: {:?}", source);
    }
}
