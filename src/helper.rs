use std::fmt;

/// Defines a lookup function from a 16 bit code to a static name.
macro_rules! code_names {
  ($(# $attr:tt)* $vis:vis fn $name:ident { $($code:pat => $label:literal,)* }) => {
    $(# $attr)*
    $vis fn $name(code: u16) -> Option<&'static str> {
      match code {
        $($code => Some($label),)*
        _ => None,
      }
    }
  };
}

/// Prints `<XXXXh> name` or `<XXXXh> ?` for a code, the way code listings are shown.
pub(crate) struct CodeFmt(pub u16, pub Option<&'static str>);

impl fmt::Display for CodeFmt {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.1 {
      Some(name) => write!(f, "<{:04X}h> {}", self.0, name),
      None => write!(f, "<{:04X}h> ?", self.0),
    }
  }
}

pub(crate) use code_names;
