/// reval - lookahead expression evaluator
///
/// Code is a sequence of self-describing units: words, set-words, paths,
/// blocks, groups and literals. There is no grammar for operator syntax;
/// an action's parameter list decides how many units it consumes and how.
///
/// # Architecture
///
/// 1. **Scanning** (`scanner` module)
///    - Turns source text into arrays of code units
///    - Classifies words, set-words, get-words, refinements and paths
///
/// 2. **Evaluation** (`backend` module)
///    - A `Feed` supplies units one at a time with one unit of lookback
///    - Each step runs in a `Frame`; actions fill their argument slots from
///      the feed according to each parameter's class
///    - Enfix actions take the value just produced as their left operand,
///      with deferral rules deciding which frame claims it
///    - Non-local exits (`return`, `throw`, `break`) travel as signals,
///      errors travel as `Err`
///
/// 3. **Host API** (`interpreter` module) and the interactive `repl`
///
/// # Example
///
/// ```rust
/// use reval::interpreter::Interpreter;
/// use reval::backend::models::Value;
///
/// let mut interp = Interpreter::new().unwrap();
/// let result = interp
///     .eval_text("sum: func [a b] [a + b] sum 1 2 * 3")
///     .unwrap();
/// assert_eq!(result, Value::Integer(7));
/// ```
///
/// # Language Features
///
/// - **Refinements**: `append/dup` requests optional arguments by name, in any order
/// - **Quoting parameters**: `'x` takes the unit literally, `:x` unless it is a group
/// - **Enfix**: `1 + 2 * 3` evaluates left to right to 9
/// - **Deferral**: `if false [1] else [2]` runs `else` on the result of `if`
/// - **Variadics**: `[<...>]` parameters pull values on demand with `take`
/// - **Generators**: `func`, `specialize`, `adapt`, `enfix`

pub mod backend;
pub mod interpreter;
pub mod repl;
pub mod scanner;

pub use backend::config::{ConfigError, EvalConfig};
pub use backend::eval::{EvalError, ErrorKind, FeedItem, Signal, SignalLabel};
pub use backend::models::{Kind, Value};
pub use backend::natives::{Bounce, Call, Native, NativeResult};
pub use interpreter::{DialectOutcome, HostError, Interpreter};
pub use scanner::{scan, ScanError};
