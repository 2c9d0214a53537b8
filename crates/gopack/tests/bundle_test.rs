//! End-to-end bundling scenarios over fixture trees written to a temp dir.

use std::fs;
use std::path::Path;

use gopack::bundle::bundle_dir;
use gopack::error::BundleError;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("fixture paths have parents"))
        .expect("create fixture dir");
    fs::write(path, content).expect("write fixture file");
}

fn fixture() -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    write(dir.path(), "go.mod", "module example.com/prog\n\ngo 1.22\n");
    dir
}

#[test]
fn bundles_program_without_dependencies() {
    let dir = fixture();
    write(
        dir.path(),
        "main.go",
        r#"package main

import "fmt"

func main() {
	fmt.Println("Hello world")
}
"#,
    );

    let out = bundle_dir(dir.path()).expect("bundle should succeed");
    assert!(out.starts_with("// Code generated by gopack; DO NOT EDIT.\n"));
    assert!(out.contains("package main\n"));
    assert!(out.contains("import (\n\t\"fmt\"\n)\n"));
    assert!(out.contains("func init() {"));
    assert!(out.contains("fmt.Println(\"Hello world\")"));
}

#[test]
fn rewrites_embedded_dependency_struct() {
    let dir = fixture();
    write(
        dir.path(),
        "lib/lib.go",
        r#"package lib

import "fmt"

type LibStruct struct {
	V int
}

func (v LibStruct) Print() {
	fmt.Println(v.V)
}
"#,
    );
    write(
        dir.path(),
        "main.go",
        r#"package main

import (
	"fmt"

	"example.com/prog/lib"
)

type Embedded struct {
	lib.LibStruct
}

func main() {
	e := Embedded{}
	e.V = 3
	e.LibStruct.Print()
	fmt.Println(e.LibStruct.V)
}
"#,
    );

    let out = bundle_dir(dir.path()).expect("bundle should succeed");
    assert!(out.contains("type lib_LibStruct struct {\n\tV int\n}"));
    assert!(out.contains("func (v lib_LibStruct) Print() {"));
    // The embedded field keeps following its renamed type.
    assert!(out.contains("e.lib_LibStruct.Print()"));
    assert!(out.contains("e.lib_LibStruct.V"));
    assert!(!out.contains("lib.LibStruct"));
}

#[test]
fn eliminates_unused_dependency_declarations() {
    let dir = fixture();
    write(
        dir.path(),
        "math/math.go",
        r#"package math

func Add(a, b int) int {
	return a + b
}

func Multiply(a, b int) int {
	return a * b
}

func Subtract(a, b int) int {
	return a - b
}

func Divide(a, b int) float64 {
	if b == 0 {
		return 0
	}
	return float64(a) / float64(b)
}

type Calculator struct {
	Result int
}

func (c *Calculator) Add(x int) {
	c.Result += x
}

func (c *Calculator) GetResult() int {
	return c.Result
}

type UnusedStruct struct {
	Value int
}

func NewUnusedStruct() *UnusedStruct {
	return &UnusedStruct{}
}

func UnusedGlobalFunction() int {
	return 42
}

const UnusedConstant = 7

var UnusedVariable = 99
"#,
    );
    write(
        dir.path(),
        "main.go",
        r#"package main

import (
	"fmt"

	"example.com/prog/math"
)

func main() {
	sum := math.Add(1, 2)
	product := math.Multiply(3, 4)
	calc := &math.Calculator{}
	calc.Add(sum)
	calc.Add(product)
	fmt.Println(calc.GetResult())
}
"#,
    );

    let out = bundle_dir(dir.path()).expect("bundle should succeed");
    assert!(out.contains("func math_Add(a, b int) int {"));
    assert!(out.contains("func math_Multiply(a, b int) int {"));
    assert!(out.contains("type math_Calculator struct {"));
    assert!(out.contains("func (c *math_Calculator) Add(x int) {"));
    assert!(out.contains("func (c *math_Calculator) GetResult() int {"));

    for gone in [
        "math_Subtract",
        "math_Divide",
        "math_UnusedStruct",
        "math_NewUnusedStruct",
        "math_UnusedGlobalFunction",
        "math_UnusedConstant",
        "math_UnusedVariable",
    ] {
        assert!(!out.contains(gone), "{gone} should be eliminated:\n{out}");
    }
    // No qualified reference into the dependency survives.
    assert!(!out.contains("math."));
}

#[test]
fn retains_interface_dispatched_method_on_generic_type() {
    let dir = fixture();
    write(
        dir.path(),
        "lib/lib.go",
        r#"package lib

import "fmt"

type Seeker[T any] struct {
	val T
}

func NewSeeker[T any](v T) *Seeker[T] {
	return &Seeker[T]{val: v}
}

func (s *Seeker[T]) Seek() {
	fmt.Println("seeker is seeking")
}
"#,
    );
    write(
        dir.path(),
        "main.go",
        r#"package main

import "example.com/prog/lib"

type Seeker interface {
	Seek()
}

func use(s Seeker) {
	s.Seek()
}

func main() {
	use(lib.NewSeeker[int](42))
}
"#,
    );

    let out = bundle_dir(dir.path()).expect("bundle should succeed");
    assert!(out.contains("type lib_Seeker[T any] struct {"));
    assert!(out.contains("func lib_NewSeeker[T any](v T) *lib_Seeker[T] {"));
    assert!(out.contains("func (s *lib_Seeker[T]) Seek() {"));
    assert!(out.contains("seeker is seeking"));
    assert!(out.contains("use(lib_NewSeeker[int](42))"));
    // The entry's own interface keeps its name.
    assert!(out.contains("type Seeker interface {\n\tSeek()\n}"));
}

#[test]
fn orders_multi_package_graph_topologically() {
    let dir = fixture();
    write(
        dir.path(),
        "unionfind/unionfind.go",
        r#"package unionfind

type UnionFind struct {
	parent []int
}

func New(n int) *UnionFind {
	u := &UnionFind{parent: make([]int, n)}
	for i := range u.parent {
		u.parent[i] = i
	}
	return u
}

func (u *UnionFind) Find(x int) int {
	if u.parent[x] == x {
		return x
	}
	u.parent[x] = u.Find(u.parent[x])
	return u.parent[x]
}

func (u *UnionFind) Union(a, b int) {
	u.parent[u.Find(a)] = u.Find(b)
}
"#,
    );
    write(
        dir.path(),
        "graph/graph.go",
        r#"package graph

import "example.com/prog/unionfind"

type Graph struct {
	n     int
	edges [][2]int
}

func New(n int) *Graph {
	return &Graph{n: n}
}

func (g *Graph) AddEdge(a, b int) {
	g.edges = append(g.edges, [2]int{a, b})
}

func (g *Graph) Components() int {
	u := unionfind.New(g.n)
	for _, e := range g.edges {
		u.Union(e[0], e[1])
	}
	count := 0
	for i := 0; i < g.n; i++ {
		if u.Find(i) == i {
			count++
		}
	}
	return count
}
"#,
    );
    write(
        dir.path(),
        "main.go",
        r#"package main

import (
	"fmt"

	"example.com/prog/graph"
)

func main() {
	g := graph.New(4)
	g.AddEdge(0, 1)
	g.AddEdge(2, 3)
	fmt.Println(g.Components())
}
"#,
    );

    let out = bundle_dir(dir.path()).expect("bundle should succeed");
    let unionfind_at = out
        .find("// ---- example.com/prog/unionfind ----")
        .expect("unionfind banner present");
    let graph_at = out
        .find("// ---- example.com/prog/graph ----")
        .expect("graph banner present");
    let main_at = out.find("func main() {").expect("main present");
    assert!(unionfind_at < graph_at, "dependency precedes importer");
    assert!(graph_at < main_at, "dependencies precede entry code");

    // graph's internal qualified call is flattened too.
    assert!(out.contains("u := unionfind_New(g.n)"));
    assert!(!out.contains("unionfind."));

    // Determinism: a second run is byte-identical.
    let again = bundle_dir(dir.path()).expect("second bundle should succeed");
    assert_eq!(out, again);
}

#[test]
fn keeps_only_surviving_names_of_grouped_constants() {
    let dir = fixture();
    write(
        dir.path(),
        "lib/lib.go",
        r#"package lib

const (
	HOGE1 = 1
	HOGE2 = 1
)

var (
	A = 1
	B = 2
)
"#,
    );
    write(
        dir.path(),
        "main.go",
        r#"package main

import (
	"fmt"

	"example.com/prog/lib"
)

func main() {
	fmt.Println(lib.HOGE1 + lib.A)
}
"#,
    );

    let out = bundle_dir(dir.path()).expect("bundle should succeed");
    assert!(out.contains("const lib_HOGE1 = 1"));
    assert!(out.contains("var lib_A = 1"));
    assert!(!out.contains("HOGE2"), "pruned constant leaked:\n{out}");
    assert!(!out.contains("lib_B"), "pruned variable leaked:\n{out}");
}

#[test]
fn keeps_iota_groups_whole_when_any_name_survives() {
    let dir = fixture();
    write(
        dir.path(),
        "lib/lib.go",
        r#"package lib

const (
	Red = iota
	Green
	Blue
)
"#,
    );
    write(
        dir.path(),
        "main.go",
        r#"package main

import (
	"fmt"

	"example.com/prog/lib"
)

func main() {
	fmt.Println(lib.Blue)
}
"#,
    );

    let out = bundle_dir(dir.path()).expect("bundle should succeed");
    // Dropping earlier names would shift the surviving constant's value.
    assert!(out.contains("lib_Red = iota"));
    assert!(out.contains("lib_Green"));
    assert!(out.contains("lib_Blue"));
}

#[test]
fn merges_initializers_in_dependency_order() {
    let dir = fixture();
    write(
        dir.path(),
        "lib/lib.go",
        r#"package lib

import "fmt"

var Counter = 10

func init() {
	Counter = 20
	fmt.Println("lib ready")
}

func Bump() {
	Counter++
}
"#,
    );
    write(
        dir.path(),
        "main.go",
        r#"package main

import (
	"fmt"

	"example.com/prog/lib"
)

func init() {
	fmt.Println("main ready")
}

func main() {
	lib.Bump()
	fmt.Println(lib.Counter)
}
"#,
    );

    let out = bundle_dir(dir.path()).expect("bundle should succeed");
    // Exactly one initializer survives: the synthetic one.
    assert_eq!(out.matches("func init() {").count(), 1);
    let lib_at = out.find("\tlib_Counter = 20").expect("lib init body merged");
    let main_at = out
        .find("\tfmt.Println(\"main ready\")")
        .expect("entry init body merged");
    assert!(lib_at < main_at, "dependency initializer runs first");
    assert!(out.contains("var lib_Counter = 10"));
    assert!(out.contains("lib_Counter++"));
}

#[test]
fn disambiguates_shared_short_names() {
    let dir = fixture();
    write(
        dir.path(),
        "red/util/util.go",
        "package util\n\nfunc Pick() int {\n\treturn 1\n}\n",
    );
    write(
        dir.path(),
        "blue/util/util.go",
        "package util\n\nfunc Pick() int {\n\treturn 2\n}\n",
    );
    write(
        dir.path(),
        "main.go",
        r#"package main

import (
	"fmt"

	blueutil "example.com/prog/blue/util"
	"example.com/prog/red/util"
)

func main() {
	fmt.Println(util.Pick() + blueutil.Pick())
}
"#,
    );

    let out = bundle_dir(dir.path()).expect("bundle should succeed");
    assert!(out.contains("return 1"));
    assert!(out.contains("return 2"));
    assert!(!out.contains("util.Pick"));
    assert!(!out.contains("blueutil.Pick"));
    // Both packages got hash-disambiguated prefixes, and they differ.
    let plain = out.matches("func util_Pick").count();
    assert_eq!(plain, 0, "shared short name must be disambiguated:\n{out}");
    assert_eq!(out.matches("_Pick() int {").count(), 2);
}

#[test]
fn rejects_colliding_output_identifiers() {
    let dir = fixture();
    write(
        dir.path(),
        "lib/lib.go",
        "package lib\n\nfunc X() int {\n\treturn 1\n}\n",
    );
    write(
        dir.path(),
        "main.go",
        r#"package main

import (
	"fmt"

	"example.com/prog/lib"
)

func lib_X() int {
	return 2
}

func main() {
	fmt.Println(lib.X() + lib_X())
}
"#,
    );

    let err = bundle_dir(dir.path()).expect_err("collision should abort");
    match err {
        BundleError::RenameCollision { output, .. } => assert_eq!(output, "lib_X"),
        other => panic!("expected RenameCollision, got {other}"),
    }
}

#[test]
fn import_block_holds_exactly_entry_stdlib_imports() {
    let dir = fixture();
    write(
        dir.path(),
        "lib/lib.go",
        r#"package lib

import "strings"

func Shout(s string) string {
	return strings.ToUpper(s)
}
"#,
    );
    write(
        dir.path(),
        "main.go",
        r#"package main

import (
	"fmt"
	"os"

	"example.com/prog/lib"
)

func main() {
	fmt.Fprintln(os.Stdout, lib.Shout("hi"))
}
"#,
    );

    let out = bundle_dir(dir.path()).expect("bundle should succeed");
    assert!(out.contains("import (\n\t\"fmt\"\n\t\"os\"\n)\n"));
    // Dependency-only stdlib imports are the formatter's job, not ours.
    assert!(!out.contains("\t\"strings\"\n"));
    // But the dependency code still references it, qualified.
    assert!(out.contains("strings.ToUpper(s)"));
}

#[test]
fn reports_missing_entry_package() {
    let dir = fixture();
    write(
        dir.path(),
        "main.go",
        "package notmain\n\nfunc main() {\n}\n",
    );

    let err = bundle_dir(dir.path()).expect_err("non-main package should abort");
    assert!(matches!(err, BundleError::NoEntryPackage(_)));
}

#[test]
fn reports_undefined_identifiers() {
    let dir = fixture();
    write(
        dir.path(),
        "main.go",
        "package main\n\nfunc main() {\n\tmissing()\n}\n",
    );

    let err = bundle_dir(dir.path()).expect_err("unresolved name should abort");
    match err {
        BundleError::TypeCheckFailed(message) => {
            assert!(message.contains("missing"), "message was: {message}")
        }
        other => panic!("expected TypeCheckFailed, got {other}"),
    }
}

#[test]
fn analysis_is_idempotent() {
    let dir = fixture();
    write(
        dir.path(),
        "lib/lib.go",
        r#"package lib

func Used() int {
	return helper()
}

func helper() int {
	return 1
}

func Unused() int {
	return 2
}
"#,
    );
    write(
        dir.path(),
        "main.go",
        r#"package main

import (
	"fmt"

	"example.com/prog/lib"
)

func main() {
	fmt.Println(lib.Used())
}
"#,
    );

    let program = gopack::loader::load(dir.path()).expect("load should succeed");
    let first = gopack::reachability::analyze(&program).expect("first analysis");
    let second = gopack::reachability::analyze(&program).expect("second analysis");
    assert_eq!(first.decls, second.decls);

    let out = bundle_dir(dir.path()).expect("bundle should succeed");
    assert!(out.contains("func lib_Used() int {"));
    assert!(out.contains("func lib_helper() int {"));
    assert!(!out.contains("lib_Unused"));
}
