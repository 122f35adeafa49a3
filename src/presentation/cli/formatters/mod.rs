pub mod graph_fmt;
