//! Lookup tables for guest fault classification

use super::ErrorKind;

/// Exception type names as the interpreter prints them
pub(super) const TYPE_NAMES: &[(&str, ErrorKind)] = &[
    ("SyntaxError", ErrorKind::SyntaxError),
    ("IndentationError", ErrorKind::IndentationError),
    ("TabError", ErrorKind::IndentationError),
    ("NameError", ErrorKind::NameError),
    ("UnboundLocalError", ErrorKind::NameError),
    ("TypeError", ErrorKind::TypeError),
    ("ValueError", ErrorKind::ValueError),
    ("KeyError", ErrorKind::KeyError),
    ("IndexError", ErrorKind::IndexError),
    ("AttributeError", ErrorKind::AttributeError),
    ("ImportError", ErrorKind::ImportError),
    ("ModuleNotFoundError", ErrorKind::ModuleNotFound),
    ("ZeroDivisionError", ErrorKind::ZeroDivision),
    ("FileNotFoundError", ErrorKind::FileNotFound),
    ("PermissionError", ErrorKind::PermissionDenied),
    ("MemoryError", ErrorKind::MemoryError),
    ("RecursionError", ErrorKind::RecursionError),
    ("RuntimeError", ErrorKind::RuntimeError),
];

/// Substring fallbacks. Order matters: more specific needles come first.
pub(super) const NEEDLES: &[(&str, ErrorKind)] = &[
    ("indentationerror", ErrorKind::IndentationError),
    ("taberror", ErrorKind::IndentationError),
    ("unexpected indent", ErrorKind::IndentationError),
    ("syntaxerror", ErrorKind::SyntaxError),
    ("invalid syntax", ErrorKind::SyntaxError),
    ("modulenotfounderror", ErrorKind::ModuleNotFound),
    ("no module named", ErrorKind::ModuleNotFound),
    ("importerror", ErrorKind::ImportError),
    ("is not allowed in this sandbox", ErrorKind::ImportError),
    ("zerodivisionerror", ErrorKind::ZeroDivision),
    ("division by zero", ErrorKind::ZeroDivision),
    ("filenotfounderror", ErrorKind::FileNotFound),
    ("no such file or directory", ErrorKind::FileNotFound),
    ("permissionerror", ErrorKind::PermissionDenied),
    ("permission denied", ErrorKind::PermissionDenied),
    ("memoryerror", ErrorKind::MemoryError),
    ("out of memory", ErrorKind::MemoryError),
    ("recursionerror", ErrorKind::RecursionError),
    ("maximum recursion depth", ErrorKind::RecursionError),
    ("unboundlocalerror", ErrorKind::NameError),
    ("nameerror", ErrorKind::NameError),
    ("is not defined", ErrorKind::NameError),
    ("typeerror", ErrorKind::TypeError),
    ("valueerror", ErrorKind::ValueError),
    ("keyerror", ErrorKind::KeyError),
    ("indexerror", ErrorKind::IndexError),
    ("index out of range", ErrorKind::IndexError),
    ("attributeerror", ErrorKind::AttributeError),
    ("has no attribute", ErrorKind::AttributeError),
    ("runtimeerror", ErrorKind::RuntimeError),
];

pub(super) fn description(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::SyntaxError => "The code contains a syntax error",
        ErrorKind::IndentationError => "The code is not indented consistently",
        ErrorKind::NameError => "A variable or function was used before it was defined",
        ErrorKind::TypeError => "An operation was applied to a value of the wrong type",
        ErrorKind::ValueError => "A function received a value it cannot accept",
        ErrorKind::KeyError => "A dictionary key was not found",
        ErrorKind::IndexError => "A sequence index is out of range",
        ErrorKind::AttributeError => "An object does not have the requested attribute",
        ErrorKind::ImportError => "A module could not be imported",
        ErrorKind::ModuleNotFound => "The requested module does not exist or is not installed",
        ErrorKind::ZeroDivision => "Division or modulo by zero",
        ErrorKind::FileNotFound => "A file or directory does not exist",
        ErrorKind::PermissionDenied => "The operation is not permitted in the sandbox",
        ErrorKind::MemoryError => "The program ran out of memory",
        ErrorKind::RecursionError => "Maximum recursion depth exceeded",
        ErrorKind::RuntimeError => "A generic runtime error occurred",
        ErrorKind::Unknown => "An unrecognised error occurred",
    }
}

pub(super) fn suggestion(kind: ErrorKind) -> Option<&'static str> {
    let hint = match kind {
        ErrorKind::SyntaxError => "Check for unbalanced brackets, missing colons or stray quotes",
        ErrorKind::IndentationError => "Use four spaces per indentation level and do not mix tabs",
        ErrorKind::NameError => "Define the name before using it and check its spelling",
        ErrorKind::TypeError => "Check argument types and convert values explicitly",
        ErrorKind::ValueError => "Validate the input before passing it to the function",
        ErrorKind::KeyError => "Use dict.get() or check membership with `in` first",
        ErrorKind::IndexError => "Check the sequence length before indexing",
        ErrorKind::AttributeError => "Check the object's type and the attribute name",
        ErrorKind::ImportError | ErrorKind::ModuleNotFound => {
            "Only allow-listed modules can be imported in the sandbox"
        }
        ErrorKind::ZeroDivision => "Guard the divisor against zero before dividing",
        ErrorKind::FileNotFound | ErrorKind::PermissionDenied => {
            "The sandbox has no general filesystem access; work with in-memory data"
        }
        ErrorKind::MemoryError => "Process data in smaller chunks or use generators",
        ErrorKind::RecursionError => "Add a base case or convert the recursion to iteration",
        ErrorKind::RuntimeError | ErrorKind::Unknown => return None,
    };
    Some(hint)
}
